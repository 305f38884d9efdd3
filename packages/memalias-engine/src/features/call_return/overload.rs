//! Overload resolution
//!
//! A pure function of (candidate signatures, argument kinds). Kinds must match
//! exactly; there are no implicit conversions. Trailing defaults fill in
//! missing arguments.

use super::signature::FunctionSignature;
use crate::errors::{EngineError, EngineResult};
use crate::shared::models::TypeKind;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Selected(&'a FunctionSignature),
    Ambiguous(Vec<&'a FunctionSignature>),
    NoMatch,
}

/// Pick the signature matching `arg_kinds`.
///
/// With `prefer_exact_arity`, candidates matched without default fill-in win
/// over candidates that need defaults; otherwise both tiers compete.
/// An unknown argument kind (`None`) matches no parameter.
pub fn resolve<'a>(
    candidates: &'a [FunctionSignature],
    arg_kinds: &[Option<TypeKind>],
    prefer_exact_arity: bool,
) -> Resolution<'a> {
    let matching: Vec<&FunctionSignature> = candidates
        .iter()
        .filter(|sig| sig.matches(arg_kinds))
        .collect();

    let tier = if prefer_exact_arity {
        let exact: Vec<&FunctionSignature> = matching
            .iter()
            .copied()
            .filter(|sig| sig.params.len() == arg_kinds.len())
            .collect();
        if exact.is_empty() {
            matching
        } else {
            exact
        }
    } else {
        matching
    };

    match tier.len() {
        0 => Resolution::NoMatch,
        1 => Resolution::Selected(tier[0]),
        _ => Resolution::Ambiguous(tier),
    }
}

/// Registered signatures grouped by function name
#[derive(Debug, Clone, Default)]
pub struct OverloadTable {
    by_name: FxHashMap<String, Vec<FunctionSignature>>,
}

impl OverloadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a signature
    pub fn register(&mut self, signature: FunctionSignature) -> EngineResult<()> {
        signature.validate()?;

        let overloads = self.by_name.entry(signature.name.clone()).or_default();
        let kinds = signature.parameter_kinds();
        if overloads.iter().any(|existing| existing.parameter_kinds() == kinds) {
            return Err(EngineError::invalid_signature(
                &signature.name,
                format!("{} is already registered", signature),
            ));
        }

        tracing::debug!("register {}", signature);
        overloads.push(signature);
        Ok(())
    }

    pub fn candidates(&self, name: &str) -> &[FunctionSignature] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resolve(
        &self,
        name: &str,
        arg_kinds: &[Option<TypeKind>],
        prefer_exact_arity: bool,
    ) -> Resolution<'_> {
        resolve(self.candidates(name), arg_kinds, prefer_exact_arity)
    }

    pub fn function_count(&self) -> usize {
        self.by_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::call_return::signature::{Parameter, PassMode, ReturnMode};
    use crate::shared::models::Value;

    fn unary(kind: TypeKind) -> FunctionSignature {
        FunctionSignature::new("f", ReturnMode::Void).param(Parameter::new("x", PassMode::ByValue, kind))
    }

    #[test]
    fn test_exact_kind_selection() {
        let candidates = vec![unary(TypeKind::Int), unary(TypeKind::Bool)];

        match resolve(&candidates, &[Some(TypeKind::Int)], true) {
            Resolution::Selected(sig) => assert_eq!(sig.params[0].kind, TypeKind::Int),
            other => panic!("expected selection, got {:?}", other),
        }
        assert_eq!(resolve(&candidates, &[Some(TypeKind::String)], true), Resolution::NoMatch);
        assert_eq!(resolve(&candidates, &[None], true), Resolution::NoMatch);
    }

    #[test]
    fn test_default_fill_in() {
        let defaulted = FunctionSignature::new("g", ReturnMode::Void)
            .param(Parameter::new("a", PassMode::ByValue, TypeKind::Int))
            .param(Parameter::new("b", PassMode::ByValue, TypeKind::Int).with_default(Value::Int(0)));
        let candidates = vec![defaulted];

        assert!(matches!(
            resolve(&candidates, &[Some(TypeKind::Int)], true),
            Resolution::Selected(_)
        ));
        assert!(matches!(
            resolve(&candidates, &[Some(TypeKind::Int), Some(TypeKind::Int)], true),
            Resolution::Selected(_)
        ));
    }

    #[test]
    fn test_exact_arity_preference() {
        let exact = unary(TypeKind::Int);
        let defaulted = FunctionSignature::new("f", ReturnMode::Void)
            .param(Parameter::new("x", PassMode::ByValue, TypeKind::Int))
            .param(Parameter::new("y", PassMode::ByValue, TypeKind::Bool).with_default(Value::Bool(true)));
        let candidates = vec![exact, defaulted];

        match resolve(&candidates, &[Some(TypeKind::Int)], true) {
            Resolution::Selected(sig) => assert_eq!(sig.params.len(), 1),
            other => panic!("expected exact-arity selection, got {:?}", other),
        }
        match resolve(&candidates, &[Some(TypeKind::Int)], false) {
            Resolution::Ambiguous(sigs) => assert_eq!(sigs.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_defaults() {
        let a = FunctionSignature::new("f", ReturnMode::Void)
            .param(Parameter::new("x", PassMode::ByValue, TypeKind::Int))
            .param(Parameter::new("y", PassMode::ByValue, TypeKind::Int).with_default(Value::Int(1)));
        let b = FunctionSignature::new("f", ReturnMode::Void)
            .param(Parameter::new("x", PassMode::ByValue, TypeKind::Int))
            .param(Parameter::new("z", PassMode::ByValue, TypeKind::Char).with_default(Value::Char('a')));
        let candidates = vec![a, b];

        assert!(matches!(
            resolve(&candidates, &[Some(TypeKind::Int)], true),
            Resolution::Ambiguous(_)
        ));
    }

    #[test]
    fn test_table_rejects_duplicates() {
        let mut table = OverloadTable::new();
        table.register(unary(TypeKind::Int)).unwrap();
        table.register(unary(TypeKind::Bool)).unwrap();
        assert!(table.register(unary(TypeKind::Int)).is_err());

        assert_eq!(table.candidates("f").len(), 2);
        assert!(table.candidates("missing").is_empty());
        assert_eq!(table.resolve("missing", &[], true), Resolution::NoMatch);
        assert_eq!(table.function_count(), 1);
    }
}
