//! Symbolic operand stack with per-slot tags, constants and call attribution.
//!
//! Values are abstract summaries, not concrete data: each slot records what is
//! statically known about the value that would occupy it at run time. The
//! stack is rebuilt from scratch for every method; replay applies each decoded
//! instruction's declared stack effect and detectors inspect the state just
//! before the effect lands.

use std::fmt;

use crate::descriptor::{ReturnKind, method_param_count, method_return_kind, method_return_signature};
use crate::ir::{CallKind, CallSite, FieldAccess, Instruction, InstructionKind};
use crate::opcodes;
use crate::summaries::MethodKey;

const JAVA_LANG_STRING: &str = "Ljava/lang/String;";

/// Constant known to occupy a stack slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Known {
    Int(i64),
    Null,
}

/// Symbolic summary of one operand-stack slot.
///
/// The tag type `T` is chosen per detector; tags survive duplication and
/// load/store round trips, and are cleared whenever an instruction produces a
/// genuinely new value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackValue<T> {
    pub signature: Option<String>,
    pub constant: Option<Known>,
    pub returned_by: Option<MethodKey>,
    pub tag: Option<T>,
}

impl<T> StackValue<T> {
    pub fn unknown() -> Self {
        Self {
            signature: None,
            constant: None,
            returned_by: None,
            tag: None,
        }
    }

    pub fn with_signature(signature: impl Into<String>) -> Self {
        Self {
            signature: Some(signature.into()),
            ..Self::unknown()
        }
    }

    pub fn int_const(value: i64) -> Self {
        Self {
            signature: Some("I".to_string()),
            constant: Some(Known::Int(value)),
            ..Self::unknown()
        }
    }

    pub fn null_const() -> Self {
        Self {
            constant: Some(Known::Null),
            ..Self::unknown()
        }
    }

    /// Whether this slot is statically the null literal.
    pub fn is_null(&self) -> bool {
        matches!(self.constant, Some(Known::Null))
    }

    /// Known integer constant, when present.
    pub fn int_constant(&self) -> Option<i64> {
        match self.constant {
            Some(Known::Int(value)) => Some(value),
            _ => None,
        }
    }
}

/// Replay fault: the instruction stream does not match the engine's model.
///
/// Detectors treat any of these as an abort of the current method's scan, not
/// as a run failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplayError {
    /// Pop past the bottom of the simulated stack.
    Underflow { opcode: u8 },
    /// Instruction shape the replay table does not model.
    Unmodeled { opcode: u8 },
    /// Call or field descriptor that does not parse.
    Descriptor { opcode: u8 },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Underflow { opcode } => {
                write!(f, "stack underflow at opcode 0x{opcode:02x}")
            }
            ReplayError::Unmodeled { opcode } => {
                write!(f, "unmodeled opcode 0x{opcode:02x}")
            }
            ReplayError::Descriptor { opcode } => {
                write!(f, "unparseable descriptor at opcode 0x{opcode:02x}")
            }
        }
    }
}

impl std::error::Error for ReplayError {}

/// The simulated operand stack plus local-variable slots.
#[derive(Clone, Debug)]
pub struct SymbolicStack<T = ()> {
    values: Vec<StackValue<T>>,
    locals: Vec<Option<StackValue<T>>>,
}

impl<T: Clone> Default for SymbolicStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> SymbolicStack<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Restore the empty method-entry state.
    pub fn reset(&mut self) {
        self.values.clear();
        self.locals.clear();
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn push(&mut self, value: StackValue<T>) {
        self.values.push(value);
    }

    pub fn pop(&mut self, opcode: u8) -> Result<StackValue<T>, ReplayError> {
        self.values.pop().ok_or(ReplayError::Underflow { opcode })
    }

    /// Slot at `depth` below the top (0 = top).
    pub fn peek(&self, depth: usize) -> Option<&StackValue<T>> {
        let len = self.values.len();
        if depth < len { self.values.get(len - 1 - depth) } else { None }
    }

    pub fn peek_mut(&mut self, depth: usize) -> Option<&mut StackValue<T>> {
        let len = self.values.len();
        if depth < len { self.values.get_mut(len - 1 - depth) } else { None }
    }

    /// Attach a tag to the current top of stack, overriding replay's default.
    pub fn set_top_tag(&mut self, tag: T) {
        if let Some(top) = self.peek_mut(0) {
            top.tag = Some(tag);
        }
    }

    fn store_local(&mut self, index: usize, value: StackValue<T>) {
        if self.locals.len() <= index {
            self.locals.resize(index + 1, None);
        }
        self.locals[index] = Some(value);
    }

    fn load_local(&self, index: usize) -> Option<&StackValue<T>> {
        self.locals.get(index).and_then(Option::as_ref)
    }

    /// Best-effort pop for untyped stack adjustments (`pop2`, array stores of
    /// wide values): long/double occupy a single simulated slot, so the raw
    /// slot count can overshoot.
    fn drop_up_to(&mut self, count: usize) {
        let keep = self.values.len().saturating_sub(count);
        self.values.truncate(keep);
    }

    fn pop_n(&mut self, count: usize, opcode: u8) -> Result<(), ReplayError> {
        for _ in 0..count {
            self.pop(opcode)?;
        }
        Ok(())
    }

    /// Apply one instruction's declared stack effect.
    pub fn replay(&mut self, inst: &Instruction) -> Result<(), ReplayError> {
        let opcode = inst.opcode;
        match &inst.kind {
            InstructionKind::ConstInt(value) => {
                self.push(StackValue::int_const(*value));
                Ok(())
            }
            InstructionKind::ConstString => {
                self.push(StackValue::with_signature(JAVA_LANG_STRING));
                Ok(())
            }
            InstructionKind::Local(index) => self.replay_local(opcode, *index as usize),
            InstructionKind::Branch(_) => self.pop_n(branch_pop_count(opcode), opcode),
            InstructionKind::Switch(_) => {
                self.pop(opcode)?;
                Ok(())
            }
            InstructionKind::Invoke(call) => self.replay_invoke(opcode, call),
            InstructionKind::Field(field) => self.replay_field(opcode, field),
            InstructionKind::Type(class_name) => self.replay_type(opcode, class_name),
            InstructionKind::Other(_) => self.replay_opcode(opcode),
        }
    }

    fn replay_local(&mut self, opcode: u8, index: usize) -> Result<(), ReplayError> {
        match opcode {
            opcodes::ALOAD | opcodes::ALOAD_0..=opcodes::ALOAD_3 => {
                let value = self
                    .load_local(index)
                    .cloned()
                    .unwrap_or_else(StackValue::unknown);
                self.push(value);
                Ok(())
            }
            opcodes::ILOAD..=opcodes::DLOAD | opcodes::ILOAD_0..=0x29 => {
                let value = self
                    .load_local(index)
                    .cloned()
                    .unwrap_or_else(|| StackValue::with_signature(primitive_load_signature(opcode)));
                self.push(value);
                Ok(())
            }
            opcodes::ISTORE..=opcodes::ASTORE | opcodes::ISTORE_0..=opcodes::ASTORE_3 => {
                let value = self.pop(opcode)?;
                self.store_local(index, value);
                Ok(())
            }
            opcodes::IINC => Ok(()),
            _ => Err(ReplayError::Unmodeled { opcode }),
        }
    }

    fn replay_invoke(&mut self, opcode: u8, call: &CallSite) -> Result<(), ReplayError> {
        let param_count = method_param_count(&call.descriptor)
            .map_err(|_| ReplayError::Descriptor { opcode })?;
        self.pop_n(param_count, opcode)?;
        if call.kind != CallKind::Static {
            self.pop(opcode)?;
        }
        let return_kind = method_return_kind(&call.descriptor)
            .map_err(|_| ReplayError::Descriptor { opcode })?;
        if return_kind != ReturnKind::Void {
            let signature = method_return_signature(&call.descriptor)
                .map_err(|_| ReplayError::Descriptor { opcode })?;
            self.push(StackValue {
                signature: Some(signature.to_string()),
                constant: None,
                returned_by: Some(MethodKey::of_call(call)),
                tag: None,
            });
        }
        Ok(())
    }

    fn replay_field(&mut self, opcode: u8, field: &FieldAccess) -> Result<(), ReplayError> {
        match opcode {
            opcodes::GETSTATIC => {
                self.push(StackValue::with_signature(field.descriptor.clone()));
                Ok(())
            }
            opcodes::GETFIELD => {
                self.pop(opcode)?;
                self.push(StackValue::with_signature(field.descriptor.clone()));
                Ok(())
            }
            opcodes::PUTFIELD => self.pop_n(2, opcode),
            opcodes::PUTSTATIC => {
                self.pop(opcode)?;
                Ok(())
            }
            _ => Err(ReplayError::Unmodeled { opcode }),
        }
    }

    fn replay_type(&mut self, opcode: u8, class_name: &str) -> Result<(), ReplayError> {
        match opcode {
            opcodes::NEW => {
                self.push(StackValue::with_signature(format!("L{class_name};")));
                Ok(())
            }
            opcodes::CHECKCAST => {
                self.pop(opcode)?;
                self.push(StackValue::with_signature(format!("L{class_name};")));
                Ok(())
            }
            opcodes::INSTANCEOF => {
                self.pop(opcode)?;
                self.push(StackValue::with_signature("I"));
                Ok(())
            }
            opcodes::ANEWARRAY => {
                self.pop(opcode)?;
                self.push(StackValue::with_signature(format!("[L{class_name};")));
                Ok(())
            }
            _ => Err(ReplayError::Unmodeled { opcode }),
        }
    }

    fn replay_opcode(&mut self, opcode: u8) -> Result<(), ReplayError> {
        match opcode {
            opcodes::NOP | opcodes::RETURN => Ok(()),
            opcodes::ACONST_NULL => {
                self.push(StackValue::null_const());
                Ok(())
            }
            // ldc of a float/long/double/class literal.
            opcodes::LDC | opcodes::LDC_W | opcodes::LDC2_W => {
                self.push(StackValue::unknown());
                Ok(())
            }
            opcodes::POP => {
                self.pop(opcode)?;
                Ok(())
            }
            opcodes::POP2 => {
                self.drop_up_to(2);
                Ok(())
            }
            opcodes::DUP => {
                let top = self.peek(0).cloned().ok_or(ReplayError::Underflow { opcode })?;
                self.push(top);
                Ok(())
            }
            opcodes::DUP_X1 => {
                let b = self.pop(opcode)?;
                let a = self.pop(opcode)?;
                self.push(b.clone());
                self.push(a);
                self.push(b);
                Ok(())
            }
            opcodes::DUP_X2 => {
                let c = self.pop(opcode)?;
                let b = self.pop(opcode)?;
                let a = self.pop(opcode)?;
                self.push(c.clone());
                self.push(a);
                self.push(b);
                self.push(c);
                Ok(())
            }
            // dup2 family approximated as a two-slot copy, one-slot when the
            // top value is wide.
            opcodes::DUP2 | opcodes::DUP2_X1 | opcodes::DUP2_X2 => {
                if self.depth() >= 2 {
                    let b = self.peek(0).cloned().ok_or(ReplayError::Underflow { opcode })?;
                    let a = self.peek(1).cloned().ok_or(ReplayError::Underflow { opcode })?;
                    self.push(a);
                    self.push(b);
                } else {
                    let top = self.peek(0).cloned().ok_or(ReplayError::Underflow { opcode })?;
                    self.push(top.clone());
                    self.push(top);
                }
                Ok(())
            }
            opcodes::SWAP => {
                let b = self.pop(opcode)?;
                let a = self.pop(opcode)?;
                self.push(b);
                self.push(a);
                Ok(())
            }
            // Binary arithmetic, shifts, logic and long/float/double compare:
            // consume two, produce a fresh scalar.
            0x60..=0x73 | 0x78..=0x83 | 0x94..=0x98 => {
                self.pop_n(2, opcode)?;
                self.push(StackValue::with_signature("I"));
                Ok(())
            }
            // Negation and primitive conversions: one in, one fresh out.
            0x74..=0x77 | 0x85..=0x93 => {
                self.pop(opcode)?;
                self.push(StackValue::with_signature("I"));
                Ok(())
            }
            opcodes::IINC => Ok(()),
            // Primitive array loads.
            0x2e..=0x31 | 0x33..=0x35 => {
                self.pop_n(2, opcode)?;
                self.push(StackValue::with_signature("I"));
                Ok(())
            }
            opcodes::AALOAD => {
                self.pop_n(2, opcode)?;
                self.push(StackValue::unknown());
                Ok(())
            }
            // Array stores; wide-value forms clamp instead of underflowing.
            0x4f..=0x56 => {
                self.drop_up_to(3);
                Ok(())
            }
            opcodes::IRETURN..=opcodes::ARETURN | opcodes::ATHROW => {
                self.pop(opcode)?;
                Ok(())
            }
            opcodes::ARRAYLENGTH => {
                self.pop(opcode)?;
                self.push(StackValue::with_signature("I"));
                Ok(())
            }
            opcodes::NEWARRAY => {
                self.pop(opcode)?;
                self.push(StackValue::unknown());
                Ok(())
            }
            opcodes::MONITORENTER | opcodes::MONITOREXIT => {
                self.pop(opcode)?;
                Ok(())
            }
            _ => Err(ReplayError::Unmodeled { opcode }),
        }
    }
}

fn branch_pop_count(opcode: u8) -> usize {
    match opcode {
        opcodes::IFEQ..=opcodes::IFLE | opcodes::IFNULL | opcodes::IFNONNULL => 1,
        opcodes::IF_ICMPEQ..=opcodes::IF_ACMPNE => 2,
        _ => 0,
    }
}

fn primitive_load_signature(opcode: u8) -> &'static str {
    match opcode {
        opcodes::LLOAD | 0x1e..=0x21 => "J",
        opcodes::FLOAD | 0x22..=0x25 => "F",
        opcodes::DLOAD | 0x26..=0x29 => "D",
        _ => "I",
    }
}
