//! Decoded-instruction data model supplied by the host's class-file decoder.
//!
//! Everything here is plain data: the decoder resolves constant-pool entries,
//! branch offsets and shortcut local indices before handing a method over, so
//! the analyses never touch raw bytecode.

/// A parsed class as delivered by the host decoder.
#[derive(Clone, Debug)]
pub struct Class {
    /// Slashed binary name, e.g. `com/example/ClassA`.
    pub name: String,
    /// Source file attribute when present, used for SARIF physical locations.
    pub source_file: Option<String>,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<Method>,
}

/// A method body with its decoded instruction stream.
#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub access: MethodAccess,
    /// Declared return nullness, answered by the host's annotation oracle.
    pub nullness: Nullness,
    pub instructions: Vec<Instruction>,
    /// Length of the code attribute in bytes.
    pub code_len: u32,
    pub line_numbers: Vec<LineNumber>,
}

impl Method {
    /// Source line covering a bytecode offset, when line numbers are present.
    pub fn line_for_offset(&self, offset: u32) -> Option<u32> {
        let mut line = None;
        for entry in &self.line_numbers {
            if entry.start_pc > offset {
                break;
            }
            line = Some(entry.line);
        }
        line
    }
}

/// Access flags relevant to the analyses.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MethodAccess {
    pub is_static: bool,
    pub is_synthetic: bool,
    pub is_bridge: bool,
}

/// Annotated nullness of a method's return value.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub enum Nullness {
    NonNull,
    Nullable,
    #[default]
    Unknown,
}

/// Line number table entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineNumber {
    pub start_pc: u32,
    pub line: u32,
}

/// One decoded instruction with resolved operands.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: u8,
    pub kind: InstructionKind,
}

/// Operand payload of a decoded instruction.
#[derive(Clone, Debug)]
pub enum InstructionKind {
    /// Integer literal push: `iconst_*`, `bipush`, `sipush`, `ldc` of an int.
    ConstInt(i64),
    /// `ldc` of a string literal.
    ConstString,
    /// Local slot for any load/store form; `aload_2` arrives as `Local(2)`.
    Local(u16),
    /// Conditional or unconditional jump with its absolute target offset.
    Branch(u32),
    /// `tableswitch`/`lookupswitch`; only the default target matters here.
    Switch(SwitchTargets),
    Invoke(CallSite),
    Field(FieldAccess),
    /// Class operand of `new`, `checkcast`, `instanceof`, `anewarray`.
    Type(String),
    /// Any other instruction, identified by opcode alone.
    Other(u8),
}

/// Switch targets reduced to what the branch tracker consumes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwitchTargets {
    pub default_target: u32,
}

/// Call site with resolved owner, name and descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallSite {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: CallKind,
}

/// Call opcode classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
}

/// Field access with resolved owner, name and descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldAccess {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}
