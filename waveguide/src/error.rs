//! Errors produced while lowering an AST to IR.
//!
//! Every kind aborts the lowering; nothing is recovered locally and the
//! core emits no warnings.

/// A fatal lowering error.
#[derive(Debug, Clone, PartialEq)]
pub enum LowerError {
    /// A variable name did not resolve anywhere on the scope chain.
    UndefinedVariable(String),
    /// A function name did not resolve anywhere on the scope chain.
    UndefinedFunction(String),
    /// A type name did not resolve anywhere on the scope chain.
    UndefinedType(String),
    /// Call-site input count disagrees with the callee declaration.
    InputArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },
    /// Call-site output count disagrees with the callee declaration.
    OutputArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },
    /// A constant was required (array size, range endpoint) but the value
    /// is not compile-time known.
    NonConstant(String),
    /// Re-typing, typed access, or indexing applied to the wrong type.
    TypeMismatch(String),
    /// A construct the lowerer reserves but does not implement.
    Unsupported(String),
}

impl std::fmt::Display for LowerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LowerError::UndefinedVariable(name) => {
                write!(f, "there is no variable with name `{}`", name)
            }
            LowerError::UndefinedFunction(name) => {
                write!(f, "there is no function with name `{}`", name)
            }
            LowerError::UndefinedType(name) => {
                write!(f, "there is no data type with name `{}`", name)
            }
            LowerError::InputArityMismatch {
                callee,
                expected,
                found,
            } => write!(
                f,
                "`{}` takes {} input(s) but {} were supplied",
                callee, expected, found
            ),
            LowerError::OutputArityMismatch {
                callee,
                expected,
                found,
            } => write!(
                f,
                "`{}` produces {} output(s) but {} were bound",
                callee, expected, found
            ),
            LowerError::NonConstant(what) => {
                write!(f, "{} must be a compile-time constant", what)
            }
            LowerError::TypeMismatch(detail) => write!(f, "type mismatch: {}", detail),
            LowerError::Unsupported(construct) => {
                write!(f, "unsupported construct: {}", construct)
            }
        }
    }
}

impl std::error::Error for LowerError {}
