//! The primitive type table.
//!
//! A fixed-order catalogue of the built-in SRC types. The order is
//! contractual: range predicates, number literal sizing, signed↔unsigned
//! conversion and constant promotion all index into it, so entries must
//! never be reordered.
//!
//! The table is partitioned into contiguous ranges:
//!
//! | Range | Entries |
//! |-------|---------|
//! | `SIGNED` | char, byte, short, int, long |
//! | `UNSIGNED` | uchar, ubyte, ushort, uint, ulong |
//! | `INTEGER` | SIGNED ∪ UNSIGNED |
//! | `FLOATING` | float, double |
//! | `NUMBER` | INTEGER ∪ FLOATING |

/// One built-in type.
///
/// `capacity` is the largest representable magnitude for numeric types and
/// 0 for the rest. `c_code_name` is used only by the emitter.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub c_code_name: &'static str,
    pub size: usize,
    pub capacity: f64,
    pub allowed_in_native: bool,
}

/// Index of a primitive in [`PRIMITIVES`].
pub type PrimitiveIndex = usize;

pub const VOID: PrimitiveIndex = 0;
pub const BOOL: PrimitiveIndex = 1;
pub const CHAR: PrimitiveIndex = 2;
pub const BYTE: PrimitiveIndex = 3;
pub const SHORT: PrimitiveIndex = 4;
pub const INT: PrimitiveIndex = 5;
pub const LONG: PrimitiveIndex = 6;
pub const UCHAR: PrimitiveIndex = 7;
pub const UBYTE: PrimitiveIndex = 8;
pub const USHORT: PrimitiveIndex = 9;
pub const UINT: PrimitiveIndex = 10;
pub const ULONG: PrimitiveIndex = 11;
pub const FLOAT: PrimitiveIndex = 12;
pub const DOUBLE: PrimitiveIndex = 13;
/// Internal placeholder used where a type slot must exist but no source
/// type is involved. Not nameable from SRC code.
pub const ANY: PrimitiveIndex = 14;

/// The primitive table. Position matters; see the module docs.
pub static PRIMITIVES: [Primitive; 15] = [
    Primitive { name: "void",   c_code_name: "void",     size: 0, capacity: 0.0,                     allowed_in_native: true },
    Primitive { name: "bool",   c_code_name: "bool",     size: 1, capacity: 0.0,                     allowed_in_native: true },
    Primitive { name: "char",   c_code_name: "int8_t",   size: 1, capacity: 127.0,                   allowed_in_native: true },
    Primitive { name: "byte",   c_code_name: "int8_t",   size: 1, capacity: 127.0,                   allowed_in_native: true },
    Primitive { name: "short",  c_code_name: "int16_t",  size: 2, capacity: 32767.0,                 allowed_in_native: true },
    Primitive { name: "int",    c_code_name: "int32_t",  size: 4, capacity: 2147483647.0,            allowed_in_native: true },
    Primitive { name: "long",   c_code_name: "int64_t",  size: 8, capacity: 9223372036854775807.0,   allowed_in_native: true },
    Primitive { name: "uchar",  c_code_name: "uint8_t",  size: 1, capacity: 255.0,                   allowed_in_native: true },
    Primitive { name: "ubyte",  c_code_name: "uint8_t",  size: 1, capacity: 255.0,                   allowed_in_native: true },
    Primitive { name: "ushort", c_code_name: "uint16_t", size: 2, capacity: 65535.0,                 allowed_in_native: true },
    Primitive { name: "uint",   c_code_name: "uint32_t", size: 4, capacity: 4294967295.0,            allowed_in_native: true },
    Primitive { name: "ulong",  c_code_name: "uint64_t", size: 8, capacity: 18446744073709551615.0,  allowed_in_native: true },
    Primitive { name: "float",  c_code_name: "float",    size: 4, capacity: 3.4028235e38,            allowed_in_native: true },
    Primitive { name: "double", c_code_name: "double",   size: 8, capacity: 1.7976931348623157e308,  allowed_in_native: true },
    Primitive { name: "<any>",  c_code_name: "void",     size: 0, capacity: 0.0,                     allowed_in_native: false },
];

/// An inclusive index range within [`PRIMITIVES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: PrimitiveIndex,
    pub end: PrimitiveIndex,
}

pub const SIGNED: Range = Range { start: CHAR, end: LONG };
pub const UNSIGNED: Range = Range { start: UCHAR, end: ULONG };
pub const INTEGER: Range = Range { start: CHAR, end: ULONG };
pub const FLOATING: Range = Range { start: FLOAT, end: DOUBLE };
pub const NUMBER: Range = Range { start: CHAR, end: DOUBLE };

/// Returns the table index for an SRC type name, if it names a primitive.
///
/// The internal `<any>` row is not nameable.
pub fn index_of(name: &str) -> Option<PrimitiveIndex> {
    PRIMITIVES[..ANY].iter().position(|p| p.name == name)
}

pub fn in_range(index: PrimitiveIndex, range: Range) -> bool {
    index >= range.start && index <= range.end
}

pub fn is_number(index: PrimitiveIndex) -> bool {
    in_range(index, NUMBER)
}

pub fn is_integer(index: PrimitiveIndex) -> bool {
    in_range(index, INTEGER)
}

pub fn is_signed(index: PrimitiveIndex) -> bool {
    in_range(index, SIGNED)
}

pub fn is_unsigned(index: PrimitiveIndex) -> bool {
    in_range(index, UNSIGNED)
}

pub fn is_floating(index: PrimitiveIndex) -> bool {
    in_range(index, FLOATING)
}

pub fn is_boolean(index: PrimitiveIndex) -> bool {
    index == BOOL
}

pub fn is_void(index: PrimitiveIndex) -> bool {
    index == VOID
}

/// Maps a signed integer primitive to its unsigned sibling by shifting
/// across the SIGNED range.
///
/// Callers must pass an index in `SIGNED`; anything else is a bug.
pub fn signed_to_unsigned(index: PrimitiveIndex) -> PrimitiveIndex {
    debug_assert!(is_signed(index));
    index + (SIGNED.end - SIGNED.start + 1)
}

pub fn capacity(index: PrimitiveIndex) -> f64 {
    PRIMITIVES[index].capacity
}

/// Smallest primitive in `range` whose capacity is at least `cap`, or the
/// input `fallback` when nothing in the range is wide enough.
pub fn smallest_with_capacity(range: Range, cap: f64, fallback: PrimitiveIndex) -> PrimitiveIndex {
    for i in range.start..=range.end {
        if PRIMITIVES[i].capacity >= cap {
            return i;
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_is_contractual() {
        let names: Vec<&str> = PRIMITIVES.iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            [
                "void", "bool", "char", "byte", "short", "int", "long", "uchar", "ubyte",
                "ushort", "uint", "ulong", "float", "double", "<any>"
            ]
        );
    }

    #[test]
    fn ranges_partition_the_table() {
        for i in SIGNED.start..=SIGNED.end {
            assert!(is_signed(i) && is_integer(i) && is_number(i));
            assert!(!is_unsigned(i) && !is_floating(i));
        }
        for i in UNSIGNED.start..=UNSIGNED.end {
            assert!(is_unsigned(i) && is_integer(i) && is_number(i));
            assert!(!is_signed(i));
        }
        for i in FLOATING.start..=FLOATING.end {
            assert!(is_floating(i) && is_number(i) && !is_integer(i));
        }
        assert!(!is_number(VOID));
        assert!(!is_number(BOOL));
        assert!(!is_number(ANY));
    }

    #[test]
    fn signed_to_unsigned_shifts_across_the_range() {
        assert_eq!(signed_to_unsigned(CHAR), UCHAR);
        assert_eq!(signed_to_unsigned(BYTE), UBYTE);
        assert_eq!(signed_to_unsigned(SHORT), USHORT);
        assert_eq!(signed_to_unsigned(INT), UINT);
        assert_eq!(signed_to_unsigned(LONG), ULONG);
    }

    #[test]
    fn index_of_ignores_the_internal_row() {
        assert_eq!(index_of("int"), Some(INT));
        assert_eq!(index_of("ulong"), Some(ULONG));
        assert_eq!(index_of("<any>"), None);
        assert_eq!(index_of("banana"), None);
    }

    #[test]
    fn capacities_increase_within_each_signedness() {
        assert!(capacity(BYTE) < capacity(SHORT));
        assert!(capacity(SHORT) < capacity(INT));
        assert!(capacity(INT) < capacity(LONG));
        assert!(capacity(UBYTE) < capacity(USHORT));
        assert!(capacity(FLOAT) < capacity(DOUBLE));
    }

    #[test]
    fn smallest_with_capacity_picks_first_fit() {
        assert_eq!(smallest_with_capacity(SIGNED, 255.0, BYTE), SHORT);
        assert_eq!(smallest_with_capacity(FLOATING, 1e40, FLOAT), DOUBLE);
        assert_eq!(smallest_with_capacity(SIGNED, 1e30, LONG), LONG);
    }
}
