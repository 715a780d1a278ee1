//! Compile-time constant values.
//!
//! Each numeric primitive has its own storage variant so that constant
//! evaluation behaves exactly like the emitted C would at run time:
//! conversions wrap, and binary operations happen in the promoted storage
//! kind. A kind of [`Constant::Dynamic`] means the value is not statically
//! known; every operation on a dynamic operand produces a dynamic result.
//!
//! Constants are tightly coupled with the lexical type stored next to them
//! in the expression properties block; pointer and array levels are not
//! tracked here.

use crate::ops::BinaryOp;
use crate::primitive::{self, PrimitiveIndex};
use smelt_base::{CompileError, Result};

/// A constant expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    UByte(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Float(f32),
    Double(f64),
    /// Element values of a constant array.
    Array(Vec<Constant>),
    /// Member values of a constant structure, in declaration order.
    Structure(Vec<Constant>),
    /// Not statically known.
    Dynamic,
}

/// Storage kind of a [`Constant`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    UByte,
    UShort,
    UInt,
    ULong,
    Float,
    Double,
    Array,
    Structure,
    Dynamic,
}

impl ConstantKind {
    fn width(self) -> usize {
        match self {
            ConstantKind::Byte | ConstantKind::UByte => 1,
            ConstantKind::Short | ConstantKind::UShort => 2,
            ConstantKind::Int | ConstantKind::UInt => 4,
            ConstantKind::Long | ConstantKind::ULong => 8,
            ConstantKind::Float => 4,
            ConstantKind::Double => 8,
            _ => 0,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ConstantKind::Byte
                | ConstantKind::Short
                | ConstantKind::Int
                | ConstantKind::Long
                | ConstantKind::UByte
                | ConstantKind::UShort
                | ConstantKind::UInt
                | ConstantKind::ULong
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ConstantKind::Byte | ConstantKind::Short | ConstantKind::Int | ConstantKind::Long
        )
    }

    pub fn is_unsigned(self) -> bool {
        self.is_integer() && !self.is_signed()
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ConstantKind::Float | ConstantKind::Double)
    }

    pub fn is_number(self) -> bool {
        self.is_integer() || self.is_floating()
    }

    fn next_wider_signed(self) -> Option<ConstantKind> {
        match self.width() {
            1 => Some(ConstantKind::Short),
            2 => Some(ConstantKind::Int),
            4 => Some(ConstantKind::Long),
            _ => None,
        }
    }

    fn wider_of_signed(a: ConstantKind, b: ConstantKind) -> ConstantKind {
        if a.width() >= b.width() {
            a
        } else {
            b
        }
    }

    /// Storage kind of a plain-primitive type.
    pub fn of_primitive(index: PrimitiveIndex) -> Option<ConstantKind> {
        match index {
            primitive::BOOL => Some(ConstantKind::Boolean),
            primitive::CHAR | primitive::BYTE => Some(ConstantKind::Byte),
            primitive::SHORT => Some(ConstantKind::Short),
            primitive::INT => Some(ConstantKind::Int),
            primitive::LONG => Some(ConstantKind::Long),
            primitive::UCHAR | primitive::UBYTE => Some(ConstantKind::UByte),
            primitive::USHORT => Some(ConstantKind::UShort),
            primitive::UINT => Some(ConstantKind::UInt),
            primitive::ULONG => Some(ConstantKind::ULong),
            primitive::FLOAT => Some(ConstantKind::Float),
            primitive::DOUBLE => Some(ConstantKind::Double),
            _ => None,
        }
    }
}

impl Constant {
    pub fn kind(&self) -> ConstantKind {
        match self {
            Constant::Boolean(_) => ConstantKind::Boolean,
            Constant::Byte(_) => ConstantKind::Byte,
            Constant::Short(_) => ConstantKind::Short,
            Constant::Int(_) => ConstantKind::Int,
            Constant::Long(_) => ConstantKind::Long,
            Constant::UByte(_) => ConstantKind::UByte,
            Constant::UShort(_) => ConstantKind::UShort,
            Constant::UInt(_) => ConstantKind::UInt,
            Constant::ULong(_) => ConstantKind::ULong,
            Constant::Float(_) => ConstantKind::Float,
            Constant::Double(_) => ConstantKind::Double,
            Constant::Array(_) => ConstantKind::Array,
            Constant::Structure(_) => ConstantKind::Structure,
            Constant::Dynamic => ConstantKind::Dynamic,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Constant::Dynamic)
    }

    fn as_i128(&self) -> Option<i128> {
        match *self {
            Constant::Boolean(v) => Some(v as i128),
            Constant::Byte(v) => Some(v as i128),
            Constant::Short(v) => Some(v as i128),
            Constant::Int(v) => Some(v as i128),
            Constant::Long(v) => Some(v as i128),
            Constant::UByte(v) => Some(v as i128),
            Constant::UShort(v) => Some(v as i128),
            Constant::UInt(v) => Some(v as i128),
            Constant::ULong(v) => Some(v as i128),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Constant::Float(v) => Some(v as f64),
            Constant::Double(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// C-style conversion into another storage kind: integer conversions
    /// wrap, floating conversions round.
    pub fn convert(&self, kind: ConstantKind) -> Constant {
        if !self.is_known() {
            return Constant::Dynamic;
        }

        if kind.is_floating() {
            let value = match self.as_f64() {
                Some(v) => v,
                None => return Constant::Dynamic,
            };
            return match kind {
                ConstantKind::Float => Constant::Float(value as f32),
                _ => Constant::Double(value),
            };
        }

        let value: i128 = match self.as_i128() {
            Some(v) => v,
            None => match self.as_f64() {
                Some(f) => f as i128,
                None => return Constant::Dynamic,
            },
        };

        match kind {
            ConstantKind::Boolean => Constant::Boolean(value != 0),
            ConstantKind::Byte => Constant::Byte(value as i8),
            ConstantKind::Short => Constant::Short(value as i16),
            ConstantKind::Int => Constant::Int(value as i32),
            ConstantKind::Long => Constant::Long(value as i64),
            ConstantKind::UByte => Constant::UByte(value as u8),
            ConstantKind::UShort => Constant::UShort(value as u16),
            ConstantKind::UInt => Constant::UInt(value as u32),
            ConstantKind::ULong => Constant::ULong(value as u64),
            _ => Constant::Dynamic,
        }
    }

    /// Reinterprets a known constant into the numeric form of a primitive
    /// type, with standard C cast semantics. Non-primitive targets and
    /// unknown values come out dynamic.
    pub fn reinterpret_cast(&self, target: PrimitiveIndex) -> Constant {
        match ConstantKind::of_primitive(target) {
            Some(kind) if self.is_known() => self.convert(kind),
            _ => Constant::Dynamic,
        }
    }
}

/// The promoted storage kind for a binary operation over two numeric
/// constants.
///
/// Follows the extend rule, except that mixed-signedness operands of the
/// same width promote one full step to the next wider signed kind, and
/// integer/floating mixes promote into the floating side (`float` widens to
/// `double` when the integer's precision exceeds a float mantissa).
fn promote(a: ConstantKind, b: ConstantKind) -> Result<ConstantKind> {
    if a == b {
        return Ok(a);
    }

    if a.is_floating() || b.is_floating() {
        let (f, other) = if a.is_floating() { (a, b) } else { (b, a) };
        if f == ConstantKind::Double || other == ConstantKind::Double {
            return Ok(ConstantKind::Double);
        }
        if other.is_integer() && other.width() >= 4 {
            return Ok(ConstantKind::Double);
        }
        return Ok(ConstantKind::Float);
    }

    if a.is_signed() == b.is_signed() {
        return Ok(ConstantKind::wider_of_signed(a, b));
    }

    let (signed, unsigned) = if a.is_signed() { (a, b) } else { (b, a) };
    if signed.width() > unsigned.width() {
        return Ok(signed);
    }
    unsigned.next_wider_signed().ok_or_else(|| {
        CompileError::syntax(
            "constant operands of types long and ulong require an explicit cast",
        )
    })
}

/// Evaluates a binary operation over two constants at compile time.
///
/// Any dynamic operand yields a dynamic result. Division or modulo by a
/// constant zero is a syntax error. Integer overflow wraps like the
/// underlying C storage type would.
pub fn eval_binary(op: BinaryOp, a: &Constant, b: &Constant) -> Result<Constant> {
    if !a.is_known() || !b.is_known() {
        return Ok(Constant::Dynamic);
    }

    if let (Constant::Boolean(x), Constant::Boolean(y)) = (a, b) {
        return eval_boolean(op, *x, *y);
    }

    if !a.kind().is_number() || !b.kind().is_number() {
        return Ok(Constant::Dynamic);
    }

    let kind = promote(a.kind(), b.kind())?;
    let a = a.convert(kind);
    let b = b.convert(kind);

    if kind.is_floating() {
        let (x, y) = (a.as_f64().unwrap(), b.as_f64().unwrap());
        if matches!(op, BinaryOp::Divide) && y == 0.0 {
            return Err(CompileError::syntax("division by zero in constant expression"));
        }
        if op.is_comparison() {
            return Ok(Constant::Boolean(compare_f64(op, x, y)));
        }
        let value = match op {
            BinaryOp::Multiply => x * y,
            BinaryOp::Divide => x / y,
            BinaryOp::Add => x + y,
            BinaryOp::Subtract => x - y,
            _ => {
                return Err(CompileError::syntax(format!(
                    "binary operation \"{}\" cannot be applied to floating constants",
                    op.symbol()
                )))
            }
        };
        return Ok(Constant::Double(value).convert(kind));
    }

    let (x, y) = (a.as_i128().unwrap(), b.as_i128().unwrap());
    if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && y == 0 {
        return Err(CompileError::syntax("division by zero in constant expression"));
    }
    if op.is_comparison() {
        return Ok(Constant::Boolean(compare_i128(op, x, y)));
    }
    let value = match op {
        BinaryOp::Multiply => x.wrapping_mul(y),
        BinaryOp::Divide => x.wrapping_div(y),
        BinaryOp::Modulo => x.wrapping_rem(y),
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Subtract => x.wrapping_sub(y),
        BinaryOp::ShiftLeft => x.wrapping_shl((y as u32) & 63),
        BinaryOp::ShiftRight => x.wrapping_shr((y as u32) & 63),
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitXor => x ^ y,
        BinaryOp::BitOr => x | y,
        BinaryOp::LogicAnd | BinaryOp::LogicOr => {
            return Err(CompileError::syntax(format!(
                "binary operation \"{}\" cannot be applied to integer constants",
                op.symbol()
            )))
        }
        _ => unreachable!("comparisons handled above"),
    };
    Ok(Constant::Long(value as i64).convert(kind))
}

fn eval_boolean(op: BinaryOp, x: bool, y: bool) -> Result<Constant> {
    let value = match op {
        BinaryOp::LogicAnd => x && y,
        BinaryOp::LogicOr => x || y,
        BinaryOp::Equal => x == y,
        BinaryOp::NotEqual => x != y,
        _ => {
            return Err(CompileError::syntax(format!(
                "binary operation \"{}\" cannot be applied to boolean constants",
                op.symbol()
            )))
        }
    };
    Ok(Constant::Boolean(value))
}

fn compare_i128(op: BinaryOp, x: i128, y: i128) -> bool {
    match op {
        BinaryOp::Greater => x > y,
        BinaryOp::GreaterEqual => x >= y,
        BinaryOp::Less => x < y,
        BinaryOp::LessEqual => x <= y,
        BinaryOp::Equal => x == y,
        BinaryOp::NotEqual => x != y,
        _ => unreachable!(),
    }
}

fn compare_f64(op: BinaryOp, x: f64, y: f64) -> bool {
    match op {
        BinaryOp::Greater => x > y,
        BinaryOp::GreaterEqual => x >= y,
        BinaryOp::Less => x < y,
        BinaryOp::LessEqual => x <= y,
        BinaryOp::Equal => x == y,
        BinaryOp::NotEqual => x != y,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_literals_add_as_bytes() {
        let result = eval_binary(BinaryOp::Add, &Constant::Byte(1), &Constant::Byte(2)).unwrap();
        assert_eq!(result, Constant::Byte(3));
    }

    #[test]
    fn integer_plus_float_is_float() {
        let result =
            eval_binary(BinaryOp::Add, &Constant::Byte(1), &Constant::Float(2.0)).unwrap();
        assert_eq!(result, Constant::Float(3.0));
    }

    #[test]
    fn int_plus_float_needs_double_precision() {
        let result =
            eval_binary(BinaryOp::Add, &Constant::Int(1), &Constant::Float(2.0)).unwrap();
        assert_eq!(result, Constant::Double(3.0));
    }

    #[test]
    fn mixed_signedness_widens_a_full_step() {
        let result = eval_binary(BinaryOp::Add, &Constant::UByte(1), &Constant::Byte(1)).unwrap();
        assert_eq!(result, Constant::Short(2));

        let result = eval_binary(BinaryOp::Add, &Constant::UInt(1), &Constant::Int(1)).unwrap();
        assert_eq!(result, Constant::Long(2));
    }

    #[test]
    fn long_with_ulong_requires_a_cast() {
        let err = eval_binary(BinaryOp::Add, &Constant::ULong(1), &Constant::Long(1)).unwrap_err();
        assert!(err.message.contains("explicit cast"));
    }

    #[test]
    fn dynamic_poisons_the_result() {
        let result =
            eval_binary(BinaryOp::Add, &Constant::Dynamic, &Constant::Int(1)).unwrap();
        assert_eq!(result, Constant::Dynamic);
    }

    #[test]
    fn division_by_constant_zero_is_a_syntax_error() {
        let err = eval_binary(BinaryOp::Divide, &Constant::Int(1), &Constant::Int(0)).unwrap_err();
        assert!(err.message.contains("division by zero"));
        let err =
            eval_binary(BinaryOp::Divide, &Constant::Float(1.0), &Constant::Float(0.0)).unwrap_err();
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn overflow_wraps_like_the_storage_type() {
        let result =
            eval_binary(BinaryOp::Add, &Constant::Byte(127), &Constant::Byte(1)).unwrap();
        assert_eq!(result, Constant::Byte(-128));
    }

    #[test]
    fn cast_wraps_like_c() {
        let c = Constant::Int(300).reinterpret_cast(crate::primitive::BYTE);
        assert_eq!(c, Constant::Byte(44));
    }

    #[test]
    fn cast_to_float_keeps_the_value() {
        let c = Constant::Byte(3).reinterpret_cast(crate::primitive::FLOAT);
        assert_eq!(c, Constant::Float(3.0));
    }

    #[test]
    fn comparisons_fold_to_booleans() {
        let result = eval_binary(BinaryOp::Less, &Constant::Byte(1), &Constant::Short(5)).unwrap();
        assert_eq!(result, Constant::Boolean(true));
        let result =
            eval_binary(BinaryOp::Equal, &Constant::Float(1.5), &Constant::Float(1.5)).unwrap();
        assert_eq!(result, Constant::Boolean(true));
    }

    #[test]
    fn boolean_logic_folds() {
        let result = eval_binary(
            BinaryOp::LogicAnd,
            &Constant::Boolean(true),
            &Constant::Boolean(false),
        )
        .unwrap();
        assert_eq!(result, Constant::Boolean(false));
    }
}
