use std::collections::HashMap;

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::immediates::Offset32;
use cranelift_codegen::ir::{types, InstBuilder, MemFlags, StackSlotData, StackSlotKind};
use cranelift_frontend::FunctionBuilder;
use cranelift_jit::JITModule;
use cranelift_module::Module;

use crate::parser::ast::{Block, Expr, Op, Stmt};
use crate::span::{Span, Spanned};

use super::errors::SemaError;
use super::types::{Place, Ty, TypeTable, TypedValue};
use super::GlobalFunc;

/// Per-function lowering engine. Owns the `FunctionBuilder` for one function
/// body and the `locals` environment, which lives exactly as long as this
/// value; `globals` and the type arenas belong to the module session.
pub(super) struct Lowerer<'a> {
    pub builder: FunctionBuilder<'a>,
    pub module: &'a mut JITModule,
    pub types: &'a mut TypeTable,
    pub globals: &'a HashMap<String, GlobalFunc>,
    /// name → stack slot of the local; cleared per function by construction.
    pub locals: HashMap<String, Place>,
    /// Return type of the function being lowered, for `return` casts.
    pub ret_ty: Ty,
}

impl<'a> Lowerer<'a> {
    pub fn finalize(self) {
        self.builder.finalize();
    }

    /// Allocate a stack slot for a value of type `ty` and hand back its
    /// address as a first-class pointer value.
    pub fn alloc_slot(&mut self, ty: Ty) -> Place {
        let size = ty.backend.bytes();
        let slot = self.builder.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            size,
            size.trailing_zeros() as u8,
        ));
        let ptr = self.builder.ins().stack_addr(types::I64, slot, 0);
        Place { ptr, stored: ty }
    }

    fn load(&mut self, place: Place) -> TypedValue {
        let v = self
            .builder
            .ins()
            .load(place.stored.backend, MemFlags::new(), place.ptr, Offset32::new(0));
        TypedValue { v, ty: place.stored, addr: Some(place) }
    }

    fn store(&mut self, place: Place, value: cranelift_codegen::ir::Value) {
        self.builder
            .ins()
            .store(MemFlags::new(), value, place.ptr, Offset32::new(0));
    }

    fn bad_type(&self, what: &'static str, expected: &str, got: Ty, span: Span) -> SemaError {
        SemaError::BadType {
            what,
            expected: expected.to_string(),
            got: self.types.display(got),
            span,
        }
    }

    /// Widen the narrower integer operand to the wider width with a signed
    /// cast. Both operands must already be integers.
    fn promote_integer_pair(
        &mut self,
        a: TypedValue,
        b: TypedValue,
    ) -> (TypedValue, TypedValue) {
        let wa = a.ty.backend.bits();
        let wb = b.ty.backend.bits();
        if wa == wb {
            (a, b)
        } else if wa < wb {
            let v = self.builder.ins().sextend(b.ty.backend, a.v);
            (TypedValue::rvalue(v, b.ty), b)
        } else {
            let v = self.builder.ins().sextend(a.ty.backend, b.v);
            (a, TypedValue::rvalue(v, a.ty))
        }
    }

    /// Implicit conversion towards `target`: the identity on exactly equal
    /// types, a signed widening between integers. Narrowing is never
    /// implicit.
    fn implicit_cast(
        &mut self,
        val: TypedValue,
        target: Ty,
        what: &'static str,
        span: Span,
    ) -> Result<TypedValue, SemaError> {
        if self.types.exactly_equal(val.ty, target) {
            return Ok(val);
        }

        if val.ty.is_integer() && target.is_integer() {
            let sw = val.ty.backend.bits();
            let dw = target.backend.bits();
            if sw < dw {
                let v = self.builder.ins().sextend(target.backend, val.v);
                return Ok(TypedValue::rvalue(v, target));
            }
        }

        Err(SemaError::BadType {
            what,
            expected: self.types.display(target),
            got: self.types.display(val.ty),
            span,
        })
    }

    /// Explicit `@T` conversion: integers cast with signed semantics in both
    /// directions; anything else is unsupported.
    fn explicit_cast(
        &mut self,
        val: TypedValue,
        target: Ty,
        span: Span,
    ) -> Result<TypedValue, SemaError> {
        if self.types.exactly_equal(val.ty, target) {
            return Ok(TypedValue::rvalue(val.v, target));
        }

        if val.ty.is_integer() && target.is_integer() {
            let sw = val.ty.backend.bits();
            let dw = target.backend.bits();
            let v = if sw < dw {
                self.builder.ins().sextend(target.backend, val.v)
            } else {
                self.builder.ins().ireduce(target.backend, val.v)
            };
            return Ok(TypedValue::rvalue(v, target));
        }

        Err(SemaError::BadType {
            what: "cast",
            expected: self.types.display(target),
            got: self.types.display(val.ty),
            span,
        })
    }

    /// Integer != 0, pointer != null; the 1-byte result feeds branches and
    /// logical operators.
    pub fn to_bool(&mut self, val: TypedValue, span: Span) -> Result<TypedValue, SemaError> {
        if !val.ty.backend.is_int() {
            return Err(SemaError::CantBool { ty: self.types.display(val.ty), span });
        }
        let v = self.builder.ins().icmp_imm(IntCC::NotEqual, val.v, 0);
        Ok(TypedValue::rvalue(v, Ty::bool()))
    }

    fn named_type(&self, name: &Spanned<String>) -> Result<Ty, SemaError> {
        match name.node.as_str() {
            "int" => Ok(Ty::int()),
            "bool" => Ok(Ty::bool()),
            _ => Err(SemaError::UnknownType { name: name.node.clone(), span: name.span }),
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    pub fn lower_expr(&mut self, expr: &Spanned<Expr>) -> Result<TypedValue, SemaError> {
        match &expr.node {
            Expr::Num(value) => {
                let v = self.builder.ins().iconst(types::I64, *value as i64);
                Ok(TypedValue::rvalue(v, Ty::int()))
            }

            Expr::Var(name) => {
                if let Some(&place) = self.locals.get(name) {
                    return Ok(self.load(place));
                }
                if let Some(global) = self.globals.get(name) {
                    let func_ref =
                        self.module.declare_func_in_func(global.id, self.builder.func);
                    let v = self.builder.ins().func_addr(types::I64, func_ref);
                    return Ok(TypedValue::rvalue(v, global.ty));
                }
                Err(SemaError::MissingVar { name: name.clone(), span: expr.span })
            }

            Expr::TypeCast { type_name, inner } => {
                let val = self.lower_expr(inner)?;
                let target = self.named_type(type_name)?;
                self.explicit_cast(val, target, expr.span)
            }

            Expr::PreOp { op, inner } => self.lower_preop(*op, inner, expr.span),

            Expr::BinOp { op, lhs, rhs } => self.lower_binop(*op, lhs, rhs, expr.span),

            Expr::SubScript { .. } => {
                Err(SemaError::Unsupported { what: "array subscripting", span: expr.span })
            }

            Expr::Call { callee, args } => self.lower_call(callee, args, expr.span),
        }
    }

    fn lower_preop(
        &mut self,
        op: Op,
        inner: &Spanned<Expr>,
        span: Span,
    ) -> Result<TypedValue, SemaError> {
        let a = self.lower_expr(inner)?;

        match op {
            // address-of: the operand must be an lvalue
            Op::BitAnd => {
                let place = a.addr.ok_or(SemaError::NotAssignable {
                    what: "the operand of '&'",
                    span: inner.span,
                })?;
                let ty = self.types.pointer_to(place.stored);
                Ok(TypedValue::rvalue(place.ptr, ty))
            }

            // dereference: pointer in, lvalue of the pointee out
            Op::Star => {
                let id = a.ty.stored.ok_or_else(|| {
                    self.bad_type("dereference", "a pointer", a.ty, inner.span)
                })?;
                let pointee = self.types.pointee(id);
                Ok(self.load(Place { ptr: a.v, stored: pointee }))
            }

            // integer compares equal to zero, pointer compares equal to null
            Op::Not => {
                if !a.ty.backend.is_int() {
                    return Err(self.bad_type("logical not", "int or pointer", a.ty, inner.span));
                }
                let v = self.builder.ins().icmp_imm(IntCC::Equal, a.v, 0);
                Ok(TypedValue::rvalue(v, Ty::bool()))
            }

            Op::Plus => {
                if !a.ty.is_integer() {
                    return Err(self.bad_type("unary '+'", "int", a.ty, inner.span));
                }
                Ok(TypedValue::rvalue(a.v, a.ty))
            }

            Op::Minus => {
                if !a.ty.is_integer() {
                    return Err(self.bad_type("unary '-'", "int", a.ty, inner.span));
                }
                let v = self.builder.ins().ineg(a.v);
                Ok(TypedValue::rvalue(v, a.ty))
            }

            Op::PlusPlus | Op::MinusMinus => {
                if !a.ty.is_integer() {
                    return Err(self.bad_type("increment", "int", a.ty, inner.span));
                }
                let place = a.addr.ok_or(SemaError::NotAssignable {
                    what: "the operand of an increment",
                    span: inner.span,
                })?;
                let delta: i64 = if op == Op::PlusPlus { 1 } else { -1 };
                let v = self.builder.ins().iadd_imm(a.v, delta);
                self.store(place, v);
                Ok(TypedValue::rvalue(v, a.ty))
            }

            _ => Err(SemaError::Unsupported { what: "this operator in unary position", span }),
        }
    }

    fn lower_binop(
        &mut self,
        op: Op,
        lhs: &Spanned<Expr>,
        rhs: &Spanned<Expr>,
        span: Span,
    ) -> Result<TypedValue, SemaError> {
        if op == Op::Assign {
            // auto-mint: first assignment to a bare, unbound name allocates
            // the slot and is the only declaration form
            if let Expr::Var(name) = &lhs.node {
                if !self.locals.contains_key(name) {
                    let value = self.lower_expr(rhs)?;
                    let place = self.alloc_slot(value.ty);
                    self.store(place, value.v);
                    self.locals.insert(name.clone(), place);
                    return Ok(TypedValue::rvalue(value.v, value.ty));
                }
            }

            let target = self.lower_expr(lhs)?;
            let value = self.lower_expr(rhs)?;
            let place = target.addr.ok_or(SemaError::NotAssignable {
                what: "the assignment target",
                span: lhs.span,
            })?;
            let value = self.implicit_cast(value, place.stored, "assignment", rhs.span)?;
            self.store(place, value.v);
            return Ok(TypedValue::rvalue(value.v, value.ty));
        }

        let a = self.lower_expr(lhs)?;
        let b = self.lower_expr(rhs)?;

        if !a.ty.is_integer() {
            return Err(self.bad_type("binary operator", "int", a.ty, lhs.span));
        }
        if !b.ty.is_integer() {
            return Err(self.bad_type("binary operator", "int", b.ty, rhs.span));
        }

        let (a, b) = self.promote_integer_pair(a, b);

        let result = match op {
            // arithmetic: signed division and remainder
            Op::Plus => TypedValue::rvalue(self.builder.ins().iadd(a.v, b.v), a.ty),
            Op::Minus => TypedValue::rvalue(self.builder.ins().isub(a.v, b.v), a.ty),
            Op::Star => TypedValue::rvalue(self.builder.ins().imul(a.v, b.v), a.ty),
            Op::Slash => TypedValue::rvalue(self.builder.ins().sdiv(a.v, b.v), a.ty),
            Op::Percent => TypedValue::rvalue(self.builder.ins().srem(a.v, b.v), a.ty),

            // signed comparisons
            Op::Lt => self.icmp(IntCC::SignedLessThan, a, b),
            Op::Gt => self.icmp(IntCC::SignedGreaterThan, a, b),
            Op::Le => self.icmp(IntCC::SignedLessThanOrEqual, a, b),
            Op::Ge => self.icmp(IntCC::SignedGreaterThanOrEqual, a, b),
            Op::EqEq => self.icmp(IntCC::Equal, a, b),
            Op::NotEq => self.icmp(IntCC::NotEqual, a, b),

            // bitwise
            Op::BitAnd => TypedValue::rvalue(self.builder.ins().band(a.v, b.v), a.ty),
            Op::BitOr => TypedValue::rvalue(self.builder.ins().bor(a.v, b.v), a.ty),
            Op::BitXor => TypedValue::rvalue(self.builder.ins().bxor(a.v, b.v), a.ty),

            // logical operators are eager: both sides are already lowered
            Op::AndAnd => {
                let la = self.to_bool(a, lhs.span)?;
                let lb = self.to_bool(b, rhs.span)?;
                TypedValue::rvalue(self.builder.ins().band(la.v, lb.v), Ty::bool())
            }
            Op::OrOr => {
                let la = self.to_bool(a, lhs.span)?;
                let lb = self.to_bool(b, rhs.span)?;
                TypedValue::rvalue(self.builder.ins().bor(la.v, lb.v), Ty::bool())
            }

            Op::Dot | Op::Arrow => {
                return Err(SemaError::Unsupported { what: "member access", span });
            }

            Op::Assign | Op::Not | Op::PlusPlus | Op::MinusMinus => {
                return Err(SemaError::Unsupported {
                    what: "this operator in binary position",
                    span,
                });
            }
        };

        Ok(result)
    }

    fn icmp(&mut self, cc: IntCC, a: TypedValue, b: TypedValue) -> TypedValue {
        let v = self.builder.ins().icmp(cc, a.v, b.v);
        TypedValue::rvalue(v, Ty::bool())
    }

    fn lower_call(
        &mut self,
        callee: &Spanned<Expr>,
        args: &[Spanned<Expr>],
        span: Span,
    ) -> Result<TypedValue, SemaError> {
        let fn_val = self.lower_expr(callee)?;

        let sig_id = fn_val.ty.func.ok_or_else(|| SemaError::NotAFunction {
            ty: self.types.display(fn_val.ty),
            span: callee.span,
        })?;

        let sig = self.types.sig(sig_id);
        if sig.params.len() != args.len() {
            return Err(SemaError::WrongArgCount {
                got: args.len(),
                want: sig.params.len(),
                span,
            });
        }
        let clif_sig = sig.clif.clone();
        let param_tys = sig.params.clone();
        let ret = sig.ret;

        // call boundaries take exact types, no implicit casts
        let mut arg_vals = Vec::with_capacity(args.len());
        for (arg, &want) in args.iter().zip(&param_tys) {
            let val = self.lower_expr(arg)?;
            if !self.types.exactly_equal(val.ty, want) {
                return Err(SemaError::BadType {
                    what: "call argument",
                    expected: self.types.display(want),
                    got: self.types.display(val.ty),
                    span: arg.span,
                });
            }
            arg_vals.push(val.v);
        }

        let sig_ref = self.builder.import_signature(clif_sig);
        let call = self.builder.ins().call_indirect(sig_ref, fn_val.v, &arg_vals);
        let result = self.builder.inst_results(call)[0];
        Ok(TypedValue::rvalue(result, ret))
    }

    // ── statements ───────────────────────────────────────────────────

    /// Lower one statement. `terminated` tracks the open/terminated state of
    /// the current block: once a terminator is emitted, the remaining
    /// statements of the block are dead and skipped.
    pub fn lower_stmt(
        &mut self,
        stmt: &Spanned<Stmt>,
        terminated: &mut bool,
    ) -> Result<(), SemaError> {
        self.lower_stmt_inner(stmt, terminated)
            .map_err(|err| err.into_statement(stmt.span))
    }

    fn lower_stmt_inner(
        &mut self,
        stmt: &Spanned<Stmt>,
        terminated: &mut bool,
    ) -> Result<(), SemaError> {
        if *terminated {
            return Ok(());
        }

        match &stmt.node {
            Stmt::Basic(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }

            Stmt::Return(expr) => {
                let val = self.lower_expr(expr)?;
                let val = self.implicit_cast(val, self.ret_ty, "return value", expr.span)?;
                self.builder.ins().return_(&[val.v]);
                *terminated = true;
                Ok(())
            }

            Stmt::Block(block) => self.lower_block(block, terminated),

            Stmt::If { cond, then_block, else_block } => {
                self.lower_if(cond, then_block, else_block, terminated)
            }

            Stmt::While { cond, body } => self.lower_while(cond, body),
        }
    }

    pub fn lower_block(
        &mut self,
        block: &Block,
        terminated: &mut bool,
    ) -> Result<(), SemaError> {
        for part in &block.parts {
            self.lower_stmt(part, terminated)?;
        }
        Ok(())
    }

    /// Two-way branch. The merge block is created lazily by the first arm
    /// that falls through; when both arms terminate no merge block exists
    /// and the statement itself terminates the surrounding block.
    fn lower_if(
        &mut self,
        cond: &Spanned<Expr>,
        then_block: &Block,
        else_block: &Block,
        terminated: &mut bool,
    ) -> Result<(), SemaError> {
        let cond_val = self.lower_expr(cond)?;
        let cond_bool = self.to_bool(cond_val, cond.span)?;

        let then_bb = self.builder.create_block();
        let else_bb = self.builder.create_block();
        self.builder.ins().brif(cond_bool.v, then_bb, &[], else_bb, &[]);

        let mut merge_bb = None;

        self.builder.switch_to_block(then_bb);
        self.builder.seal_block(then_bb);
        let mut then_terminated = false;
        self.lower_block(then_block, &mut then_terminated)?;
        if !then_terminated {
            let bb = *merge_bb.get_or_insert_with(|| self.builder.create_block());
            self.builder.ins().jump(bb, &[]);
        }

        self.builder.switch_to_block(else_bb);
        self.builder.seal_block(else_bb);
        let mut else_terminated = false;
        self.lower_block(else_block, &mut else_terminated)?;
        if !else_terminated {
            let bb = *merge_bb.get_or_insert_with(|| self.builder.create_block());
            self.builder.ins().jump(bb, &[]);
        }

        match merge_bb {
            Some(bb) => {
                self.builder.switch_to_block(bb);
                self.builder.seal_block(bb);
            }
            None => *terminated = true,
        }
        Ok(())
    }

    /// Standard header/body/exit loop shape.
    fn lower_while(&mut self, cond: &Spanned<Expr>, body: &Block) -> Result<(), SemaError> {
        let header_bb = self.builder.create_block();
        let body_bb = self.builder.create_block();
        let exit_bb = self.builder.create_block();

        self.builder.ins().jump(header_bb, &[]);

        self.builder.switch_to_block(header_bb);
        let cond_val = self.lower_expr(cond)?;
        let cond_bool = self.to_bool(cond_val, cond.span)?;
        self.builder.ins().brif(cond_bool.v, body_bb, &[], exit_bb, &[]);

        self.builder.switch_to_block(body_bb);
        self.builder.seal_block(body_bb);
        let mut body_terminated = false;
        self.lower_block(body, &mut body_terminated)?;
        if !body_terminated {
            self.builder.ins().jump(header_bb, &[]);
        }

        self.builder.seal_block(header_bb);
        self.builder.switch_to_block(exit_bb);
        self.builder.seal_block(exit_bb);
        Ok(())
    }
}
