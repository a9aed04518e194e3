pub mod errors;
pub mod lower;
pub mod types;

use std::collections::{HashMap, HashSet};

use cranelift_codegen::control::ControlPlane;
use cranelift_codegen::ir::immediates::Offset32;
use cranelift_codegen::ir::{types as ir_types, AbiParam, InstBuilder, MemFlags};
use cranelift_codegen::isa::CallConv;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};

use crate::diagnostics::CompileError;
use crate::parser::ast::{Block, FuncDec, Global, Stmt};
use crate::span::Spanned;
use crate::Options;
use errors::SemaError;
use lower::Lowerer;
use types::{CallKind, FuncSig, SigId, Ty, TypeTable};

/// A name bound at module scope: the declared function and its type.
#[derive(Clone, Copy)]
pub struct GlobalFunc {
    pub id: FuncId,
    pub ty: Ty,
}

fn host_target_triple() -> Result<&'static str, CompileError> {
    if cfg!(all(target_arch = "aarch64", target_os = "macos")) {
        Ok("aarch64-apple-darwin")
    } else if cfg!(all(target_arch = "x86_64", target_os = "macos")) {
        Ok("x86_64-apple-darwin")
    } else if cfg!(all(target_arch = "x86_64", target_os = "linux")) {
        Ok("x86_64-unknown-linux-gnu")
    } else if cfg!(all(target_arch = "aarch64", target_os = "linux")) {
        Ok("aarch64-unknown-linux-gnu")
    } else {
        Err(CompileError::codegen(format!(
            "unsupported host target: {}-{}",
            std::env::consts::ARCH,
            std::env::consts::OS
        )))
    }
}

/// Lower all parsed globals into a JIT module.
pub fn codegen(globals: &[Spanned<Global>], opts: &Options) -> Result<Jit, CompileError> {
    let mut flag_builder = settings::builder();
    flag_builder.set("use_colocated_libcalls", "false").unwrap();
    flag_builder.set("is_pic", "false").unwrap();
    flag_builder
        .set("opt_level", if opts.optimize { "speed" } else { "none" })
        .unwrap();

    let isa_builder = cranelift_codegen::isa::lookup_by_name(host_target_triple()?)
        .map_err(|e| CompileError::codegen(format!("unsupported target: {e}")))?;
    let isa = isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| CompileError::codegen(format!("ISA error: {e}")))?;

    let jit_builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());

    let mut session = Session {
        module: JITModule::new(jit_builder),
        types: TypeTable::default(),
        globals: HashMap::new(),
        defined: HashSet::new(),
    };

    for global in globals {
        session.lower_global(global, opts)?;
    }

    // a declaration alone is not runnable
    let main = match session.globals.get("main") {
        Some(global) if session.defined.contains("main") => Some(global.id),
        _ => None,
    };
    Ok(Jit { module: session.module, main })
}

/// Module-lifetime compilation state: the JIT module, the type arenas, and
/// the global name environment.
struct Session {
    module: JITModule,
    types: TypeTable,
    globals: HashMap<String, GlobalFunc>,
    defined: HashSet<String>,
}

impl Session {
    fn lower_global(
        &mut self,
        global: &Spanned<Global>,
        opts: &Options,
    ) -> Result<(), CompileError> {
        match &global.node {
            Global::FuncDec(dec) => {
                self.declare_func(dec)?;
                Ok(())
            }
            Global::Function { dec, body } => self.define_func(dec, body, opts),
            Global::Basic(expr) => Err(CompileError::LowerGlobal {
                source: SemaError::Unsupported {
                    what: "a top-level expression statement",
                    span: expr.span,
                },
            }),
        }
    }

    /// Declare a function and bind its name. Parameter and return types
    /// default to int. A redeclaration reuses the first binding, so a
    /// forward declaration and its definition share one id.
    fn declare_func(&mut self, dec: &FuncDec) -> Result<(FuncId, SigId), CompileError> {
        if let Some(existing) = self.globals.get(&dec.name.node) {
            let sig_id = existing
                .ty
                .func
                .ok_or_else(|| CompileError::codegen("global is not a function"))?;
            if self.types.sig(sig_id).params.len() != dec.params.len() {
                return Err(CompileError::codegen(format!(
                    "conflicting declarations of '{}'",
                    dec.name.node
                )));
            }
            return Ok((existing.id, sig_id));
        }

        let call = if dec.is_c { CallKind::C } else { CallKind::Fast };
        let mut sig = self.module.make_signature();
        sig.call_conv = match call {
            CallKind::C => self.module.isa().default_call_conv(),
            CallKind::Fast => CallConv::Fast,
        };
        for _ in &dec.params {
            sig.params.push(AbiParam::new(ir_types::I64));
        }
        sig.returns.push(AbiParam::new(ir_types::I64));

        let id = self
            .module
            .declare_function(&dec.name.node, Linkage::Export, &sig)
            .map_err(|e| CompileError::codegen(format!("declare function error: {e}")))?;

        let sig_id = self.types.add_sig(FuncSig {
            clif: sig,
            call,
            ret: Ty::int(),
            params: vec![Ty::int(); dec.params.len()],
        });

        self.globals
            .insert(dec.name.node.clone(), GlobalFunc { id, ty: Ty::function(sig_id) });
        Ok((id, sig_id))
    }

    fn define_func(
        &mut self,
        dec: &FuncDec,
        body: &Block,
        opts: &Options,
    ) -> Result<(), CompileError> {
        let (id, sig_id) = self.declare_func(dec)?;
        let name = &dec.name.node;

        let mut ctx = Context::new();
        ctx.func.signature = self.types.sig(sig_id).clif.clone();

        let mut builder_ctx = FunctionBuilderContext::new();
        {
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);

            let entry = builder.create_block();
            builder.append_block_params_for_function_params(entry);
            builder.switch_to_block(entry);
            builder.seal_block(entry);
            let incoming = builder.block_params(entry).to_vec();

            let ret_ty = self.types.sig(sig_id).ret;
            let param_tys = self.types.sig(sig_id).params.clone();

            let mut lowerer = Lowerer {
                builder,
                module: &mut self.module,
                types: &mut self.types,
                globals: &self.globals,
                locals: HashMap::new(),
                ret_ty,
            };

            // one slot per parameter, holding the incoming argument
            for ((pname, &pty), value) in dec.params.iter().zip(&param_tys).zip(incoming) {
                let place = lowerer.alloc_slot(pty);
                lowerer
                    .builder
                    .ins()
                    .store(MemFlags::new(), value, place.ptr, Offset32::new(0));
                lowerer.locals.insert(pname.node.clone(), place);
            }

            let mut terminated = false;
            lowerer
                .lower_block(body, &mut terminated)
                .map_err(|e| CompileError::lower(name.clone(), e))?;

            if !matches!(body.parts.last().map(|s| &s.node), Some(Stmt::Return(_))) {
                return Err(CompileError::lower(
                    name.clone(),
                    SemaError::MissingReturn { func: name.clone(), span: dec.name.span },
                ));
            }

            lowerer.finalize();
        }

        if opts.print_ir_pre {
            println!("; {name}, before optimization");
            println!("{}", ctx.func.display());
        }

        if opts.verify {
            if let Err(errors) =
                cranelift_codegen::verifier::verify_function(&ctx.func, self.module.isa())
            {
                return Err(CompileError::Verify {
                    msg: format!("{errors}\noffending IR:\n{}", ctx.func.display()),
                });
            }
        }

        if opts.print_ir_post {
            let mut opt_ctx = Context::for_function(ctx.func.clone());
            opt_ctx
                .optimize(self.module.isa(), &mut ControlPlane::default())
                .map_err(|e| CompileError::codegen(format!("optimize error: {e}")))?;
            println!("; {name}, after optimization");
            println!("{}", opt_ctx.func.display());
        }

        self.module
            .define_function(id, &mut ctx)
            .map_err(|e| CompileError::codegen(format!("define function error: {e}")))?;
        self.defined.insert(name.clone());

        Ok(())
    }
}

/// The compiled module, ready to finalize and execute. Running consumes the
/// session; the module moves out of compilation state here.
pub struct Jit {
    module: JITModule,
    main: Option<FuncId>,
}

impl Jit {
    /// Finalize code memory, look up `main`, and call it as `int64_t()`.
    pub fn run_main(mut self) -> Result<i64, CompileError> {
        let main = self
            .main
            .ok_or_else(|| CompileError::jit("no 'main' function defined"))?;

        self.module
            .finalize_definitions()
            .map_err(|e| CompileError::jit(format!("finalize error: {e}")))?;

        let code = self.module.get_finalized_function(main);
        // The entry point contract is int64_t(); the test programs declare
        // `cfn main`, which matches the host C convention.
        let main_fn: extern "C" fn() -> i64 = unsafe { std::mem::transmute(code) };
        Ok(main_fn())
    }
}
