use cranelift_codegen::ir::{self, types, Signature};

/// Handle into the per-module pointee-type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TyId(u32);

/// Handle into the per-module function-signature arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigId(u32);

/// A small-lang type: a backend type handle plus the links that the backend
/// handle alone cannot carry. Under Cranelift both pointers and the default
/// int are `I64`, so pointer-ness lives in `stored` and callability in
/// `func`; exact equality is structural over the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ty {
    pub backend: ir::Type,
    /// Pointee type; set iff this is a pointer type.
    pub stored: Option<TyId>,
    /// Signature record; set iff values of this type are callable.
    pub func: Option<SigId>,
}

impl Ty {
    /// The default 64-bit signed integer type, `int`.
    pub fn int() -> Ty {
        Ty { backend: types::I64, stored: None, func: None }
    }

    /// The narrow integer type `bool` (Cranelift's comparison result type).
    pub fn bool() -> Ty {
        Ty { backend: types::I8, stored: None, func: None }
    }

    pub fn function(sig: SigId) -> Ty {
        Ty { backend: types::I64, stored: None, func: Some(sig) }
    }

    pub fn is_integer(&self) -> bool {
        self.stored.is_none() && self.func.is_none() && self.backend.is_int()
    }
}

/// Calling convention tag carried by every function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `cfn`: the host C convention.
    C,
    /// `fn`: Cranelift's fast convention.
    Fast,
}

/// A function signature record: the Cranelift signature used at call sites
/// plus the typed view of it.
#[derive(Debug, Clone)]
pub struct FuncSig {
    pub clif: Signature,
    pub call: CallKind,
    pub ret: Ty,
    pub params: Vec<Ty>,
}

/// Per-module arenas for pointee types and function signatures. Handles are
/// indices and stay valid for the whole compilation session.
#[derive(Default)]
pub struct TypeTable {
    pointees: Vec<Ty>,
    sigs: Vec<FuncSig>,
}

impl TypeTable {
    /// Intern `pointee` and return the pointer-to type.
    pub fn pointer_to(&mut self, pointee: Ty) -> Ty {
        let id = match self.pointees.iter().position(|&t| t == pointee) {
            Some(id) => id,
            None => {
                self.pointees.push(pointee);
                self.pointees.len() - 1
            }
        };
        Ty { backend: types::I64, stored: Some(TyId(id as u32)), func: None }
    }

    pub fn pointee(&self, id: TyId) -> Ty {
        self.pointees[id.0 as usize]
    }

    pub fn add_sig(&mut self, sig: FuncSig) -> SigId {
        self.sigs.push(sig);
        SigId(self.sigs.len() as u32 - 1)
    }

    pub fn sig(&self, id: SigId) -> &FuncSig {
        &self.sigs[id.0 as usize]
    }

    /// Exact type equality: identical backend handle, structurally equal
    /// pointee chains, structurally equal signatures.
    pub fn exactly_equal(&self, a: Ty, b: Ty) -> bool {
        if a.backend != b.backend {
            return false;
        }

        let funcs_ok = match (a.func, b.func) {
            (None, None) => true,
            (Some(x), Some(y)) => x == y || self.sigs_equal(x, y),
            _ => false,
        };
        if !funcs_ok {
            return false;
        }

        match (a.stored, b.stored) {
            (None, None) => true,
            (Some(x), Some(y)) => {
                x == y || self.exactly_equal(self.pointee(x), self.pointee(y))
            }
            _ => false,
        }
    }

    fn sigs_equal(&self, a: SigId, b: SigId) -> bool {
        let sa = self.sig(a);
        let sb = self.sig(b);
        sa.call == sb.call
            && sa.params.len() == sb.params.len()
            && self.exactly_equal(sa.ret, sb.ret)
            && sa
                .params
                .iter()
                .zip(&sb.params)
                .all(|(&pa, &pb)| self.exactly_equal(pa, pb))
    }

    /// Human-readable type name for error messages.
    pub fn display(&self, ty: Ty) -> String {
        if let Some(sig_id) = ty.func {
            let sig = self.sig(sig_id);
            let params = sig
                .params
                .iter()
                .map(|&p| self.display(p))
                .collect::<Vec<_>>()
                .join(", ");
            let kw = match sig.call {
                CallKind::C => "cfn",
                CallKind::Fast => "fn",
            };
            return format!("{kw}({params}) {}", self.display(sig.ret));
        }
        if let Some(id) = ty.stored {
            return format!("*{}", self.display(self.pointee(id)));
        }
        match ty.backend {
            types::I64 => "int".to_string(),
            types::I8 => "bool".to_string(),
            other => format!("i{}", other.bits()),
        }
    }
}

/// A typed SSA value. `addr` is the lvalue witness: present iff the value
/// was produced by reading a storage location that can be written back.
#[derive(Clone, Copy)]
pub struct TypedValue {
    pub v: ir::Value,
    pub ty: Ty,
    pub addr: Option<Place>,
}

impl TypedValue {
    pub fn rvalue(v: ir::Value, ty: Ty) -> Self {
        Self { v, ty, addr: None }
    }
}

/// A storage location: a pointer-valued SSA handle plus the stored type.
#[derive(Clone, Copy)]
pub struct Place {
    pub ptr: ir::Value,
    pub stored: Ty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_codegen::isa::CallConv;

    fn sig(table: &mut TypeTable, call: CallKind, params: usize) -> SigId {
        let mut clif = Signature::new(CallConv::SystemV);
        for _ in 0..params {
            clif.params.push(cranelift_codegen::ir::AbiParam::new(types::I64));
        }
        clif.returns.push(cranelift_codegen::ir::AbiParam::new(types::I64));
        table.add_sig(FuncSig {
            clif,
            call,
            ret: Ty::int(),
            params: vec![Ty::int(); params],
        })
    }

    #[test]
    fn int_and_bool_are_integers() {
        assert!(Ty::int().is_integer());
        assert!(Ty::bool().is_integer());
        assert_eq!(Ty::int().backend.bits(), 64);
        assert_eq!(Ty::bool().backend.bits(), 8);
    }

    #[test]
    fn pointer_is_not_an_integer_despite_backend_handle() {
        let mut table = TypeTable::default();
        let ptr = table.pointer_to(Ty::int());
        assert_eq!(ptr.backend, types::I64);
        assert!(!ptr.is_integer());
        assert!(!table.exactly_equal(ptr, Ty::int()));
    }

    #[test]
    fn pointer_interning_is_canonical() {
        let mut table = TypeTable::default();
        let a = table.pointer_to(Ty::int());
        let b = table.pointer_to(Ty::int());
        assert_eq!(a, b);
        assert!(table.exactly_equal(a, b));

        let pp = table.pointer_to(a);
        assert!(!table.exactly_equal(pp, a));
        assert!(table.exactly_equal(table.pointee(pp.stored.unwrap()), a));
    }

    #[test]
    fn signatures_compare_structurally() {
        let mut table = TypeTable::default();
        let a = sig(&mut table, CallKind::Fast, 1);
        let b = sig(&mut table, CallKind::Fast, 1);
        let c = sig(&mut table, CallKind::C, 1);
        let d = sig(&mut table, CallKind::Fast, 2);

        assert!(table.exactly_equal(Ty::function(a), Ty::function(b)));
        assert!(!table.exactly_equal(Ty::function(a), Ty::function(c)));
        assert!(!table.exactly_equal(Ty::function(a), Ty::function(d)));
        assert!(!table.exactly_equal(Ty::function(a), Ty::int()));
    }

    #[test]
    fn display_names() {
        let mut table = TypeTable::default();
        assert_eq!(table.display(Ty::int()), "int");
        assert_eq!(table.display(Ty::bool()), "bool");
        let ptr = table.pointer_to(Ty::int());
        assert_eq!(table.display(ptr), "*int");
        let s = sig(&mut table, CallKind::Fast, 2);
        assert_eq!(table.display(Ty::function(s)), "fn(int, int) int");
    }
}
