//! The Waveguide AST.
//!
//! This is the closed variant handed to the lowering pass: four expression
//! "leaf" kinds plus calls, variable accesses, operator lists and signed
//! expressions; statements cover calls, assignment, declarations, control
//! flow and `return`. The shapes mirror the surface grammar directly — no
//! desugaring happens here except `elif` chains, which the parser nests
//! into the else-branch of the enclosing `if`.

use serde::{Deserialize, Serialize};

/// A statement in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    FunctionCall(FunctionCall),
    Assign(AssignStatement),
    VarDec(VarDecStatement),
    Return(ReturnStatement),
    FunctionDec(FunctionDec),
    Branch(Branch),
    ForEach(ForEach),
    While(While),
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Int(i32),
    Float(f32),
    Bool(bool),
    ArrayLiteral(Vec<Expression>),
    Range(Box<RangeExpression>),
    FunctionCall(Box<FunctionCall>),
    Variable(VariableAccess),
    OperatorList(Box<OperatorList>),
    Signed(Box<SignedExpression>),
}

/// A range literal: `{start, end}` or `{start, end, step}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeExpression {
    pub start: Expression,
    pub end: Expression,
    pub step: Option<Expression>,
}

/// A variable reference with zero or more index accessors: `xs[i][j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableAccess {
    pub name: String,
    pub indexes: Vec<Expression>,
}

/// `start op1 v1 op2 v2 …` at a single precedence level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorList {
    pub start: Expression,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op: BinaryOp,
    pub value: Expression,
}

/// Binary operators, one per surface spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lte,
    Gte,
    Lt,
    Gt,
    And,
    Or,
    Xor,
    Band,
    Bor,
    Bxor,
}

/// `+expr` or `-expr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedExpression {
    pub negative: bool,
    pub value: Expression,
}

/// A reference to a data type: name plus array sizes in source order.
///
/// Sizes wrap outward as written, so `Int[2][3]` is a 3-array whose
/// elements are `Int[2]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTypeExpr {
    pub name: String,
    pub array_sizes: Vec<Expression>,
}

/// One output slot at a call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputSpec {
    /// `none` — the callee's output is dropped.
    Discard,
    /// Write into an existing l-value.
    Variable(VariableAccess),
    /// `Int r` — declare a fresh variable and bind it.
    Declare { ty: DataTypeExpr, name: String },
}

/// A function call, in statement or expression position.
///
/// `outputs` is `None` when the call site has no `:(…)` list; the lowerer
/// synthesizes one return-style output per callee-declared output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub inputs: Vec<Expression>,
    pub outputs: Option<Vec<OutputSpec>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStatement {
    pub target: VariableAccess,
    pub value: Expression,
}

/// One declarator in a declaration statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDec {
    pub name: String,
    pub init: Option<Expression>,
}

/// `Int a = 1, b;` — one type, several declarators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecStatement {
    pub ty: DataTypeExpr,
    pub decs: Vec<VarDec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub value: Expression,
}

/// A typed parameter in a function signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub ty: DataTypeExpr,
    pub name: String,
}

/// `def name(ins):(outs) [lambdas] { body }`.
///
/// A bare-type output list (`def f(Int a):Int { … }`) declares the single
/// implicit output `return`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDec {
    pub name: String,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<Parameter>,
    pub lambdas: Vec<FunctionDec>,
    pub body: Vec<Statement>,
}

/// `if (cond) { … } [else { … }]`; `elif` chains nest in `if_false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expression,
    pub if_true: Vec<Statement>,
    pub if_false: Vec<Statement>,
}

/// `for counter in e1, e2, … { body }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEach {
    pub counter: String,
    pub values: Vec<Expression>,
    pub body: Vec<Statement>,
}

/// `while (cond) { body }` — parsed, but rejected by the lowerer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct While {
    pub condition: Expression,
    pub body: Vec<Statement>,
}
