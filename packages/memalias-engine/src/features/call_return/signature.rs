//! Function signatures

use crate::errors::{EngineError, EngineResult};
use crate::shared::models::{DeclaredType, TypeKind, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an argument reaches its parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    /// Fresh independent copy
    ByValue,
    /// Alias of the caller's storage
    ByReference,
    /// Copy of an address
    ByPointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    ByValue,
    ByPointer,
    ByReference,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub mode: PassMode,
    /// `T` in `T`, `T&` or `T*`
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, mode: PassMode, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            mode,
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Kind an argument must have to match this parameter
    pub fn argument_kind(&self) -> TypeKind {
        match self.mode {
            PassMode::ByPointer => TypeKind::pointer_to(self.kind.clone()),
            PassMode::ByValue | PassMode::ByReference => self.kind.clone(),
        }
    }

    /// Storage type of the parameter binding in the callee frame
    pub fn declared_type(&self) -> DeclaredType {
        let scalar = DeclaredType::scalar(self.kind.clone());
        match self.mode {
            PassMode::ByValue => scalar,
            PassMode::ByReference => DeclaredType::reference_to(scalar),
            PassMode::ByPointer => DeclaredType::pointer_to(scalar),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.mode {
            PassMode::ByValue => "",
            PassMode::ByReference => "&",
            PassMode::ByPointer => "*",
        };
        write!(f, "{}{} {}", self.kind, suffix, self.name)?;
        if let Some(default) = &self.default {
            write!(f, " = {}", default)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_mode: ReturnMode,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, return_mode: ReturnMode) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_mode,
        }
    }

    /// Builder: append a parameter
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Parameters without a default
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.required_count() && count <= self.params.len()
    }

    /// Whether `arg_kinds` match the parameters, defaults filling the rest
    pub fn matches(&self, arg_kinds: &[Option<TypeKind>]) -> bool {
        self.accepts_arity(arg_kinds.len())
            && self
                .params
                .iter()
                .zip(arg_kinds)
                .all(|(param, kind)| kind.as_ref() == Some(&param.argument_kind()))
    }

    /// Argument kinds without defaults, used to spot duplicate registrations
    pub fn parameter_kinds(&self) -> Vec<TypeKind> {
        self.params.iter().map(Parameter::argument_kind).collect()
    }

    /// Defaults only trailing, each default of its parameter's kind, none on
    /// reference parameters
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.is_empty() {
            return Err(EngineError::invalid_signature(
                &self.name,
                "function name must not be empty",
            ));
        }

        let mut seen_default = false;
        for param in &self.params {
            match &param.default {
                Some(_) if param.mode == PassMode::ByReference => {
                    return Err(EngineError::invalid_signature(
                        &self.name,
                        format!("reference parameter '{}' cannot take a default value", param.name),
                    ));
                }
                Some(default) => {
                    seen_default = true;
                    if default.is_indeterminate() {
                        return Err(EngineError::invalid_signature(
                            &self.name,
                            format!("default of '{}' must be a concrete value", param.name),
                        ));
                    }
                    if !default.matches_kind(&param.argument_kind()) {
                        return Err(EngineError::invalid_signature(
                            &self.name,
                            format!(
                                "default {} does not match parameter '{}' of kind {}",
                                default,
                                param.name,
                                param.argument_kind()
                            ),
                        ));
                    }
                }
                None if seen_default => {
                    return Err(EngineError::invalid_signature(
                        &self.name,
                        format!(
                            "parameter '{}' follows a defaulted parameter; defaults must be trailing",
                            param.name
                        ),
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}({})", self.name, params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> FunctionSignature {
        FunctionSignature::new("f", ReturnMode::Void)
            .param(Parameter::new("a", PassMode::ByValue, TypeKind::Int))
            .param(Parameter::new("b", PassMode::ByPointer, TypeKind::Int))
            .param(Parameter::new("c", PassMode::ByValue, TypeKind::Bool).with_default(Value::Bool(false)))
    }

    #[test]
    fn test_arity_and_matching() {
        let sig = sig();
        assert_eq!(sig.required_count(), 2);
        assert!(sig.accepts_arity(2));
        assert!(sig.accepts_arity(3));
        assert!(!sig.accepts_arity(1));

        let int_ptr = TypeKind::pointer_to(TypeKind::Int);
        assert!(sig.matches(&[Some(TypeKind::Int), Some(int_ptr.clone())]));
        assert!(sig.matches(&[Some(TypeKind::Int), Some(int_ptr.clone()), Some(TypeKind::Bool)]));
        assert!(!sig.matches(&[Some(TypeKind::Int), Some(TypeKind::Int)]));
        assert!(!sig.matches(&[Some(TypeKind::Int), None]));
    }

    #[test]
    fn test_validate_trailing_defaults() {
        assert!(sig().validate().is_ok());

        let bad = FunctionSignature::new("g", ReturnMode::ByValue)
            .param(Parameter::new("a", PassMode::ByValue, TypeKind::Int).with_default(Value::Int(1)))
            .param(Parameter::new("b", PassMode::ByValue, TypeKind::Int));
        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_validate_default_kind() {
        let bad = FunctionSignature::new("h", ReturnMode::ByValue)
            .param(Parameter::new("a", PassMode::ByValue, TypeKind::Int).with_default(Value::Bool(true)));
        assert!(bad.validate().is_err());

        let null_default = FunctionSignature::new("h", ReturnMode::ByValue)
            .param(Parameter::new("p", PassMode::ByPointer, TypeKind::Int).with_default(Value::null()));
        assert!(null_default.validate().is_ok());

        let ref_default = FunctionSignature::new("h", ReturnMode::ByValue)
            .param(Parameter::new("r", PassMode::ByReference, TypeKind::Int).with_default(Value::Int(5)));
        assert!(ref_default.validate().is_err());
    }

    #[test]
    fn test_declared_types() {
        let param = Parameter::new("r", PassMode::ByReference, TypeKind::Double);
        assert_eq!(
            param.declared_type(),
            DeclaredType::reference_to(DeclaredType::scalar(TypeKind::Double))
        );
        assert_eq!(param.to_string(), "double& r");
        assert_eq!(sig().to_string(), "f(int a, int* b, bool c = false)");
    }
}
