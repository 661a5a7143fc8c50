use std::fmt;

/// Error codes for all backend diagnostics.
///
/// Format: E#### where the first digit indicates the component:
/// - E1xxx: Layout errors
/// - E2xxx: Generic instantiation errors
/// - E3xxx: Interface errors
/// - E4xxx: Constant evaluation errors
/// - E5xxx: ABI errors
/// - E6xxx: Body lowering errors
/// - E9xxx: Internal compiler errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Layout Errors (E1xxx)
    /// Struct contains itself by value
    E1001,
    /// Forward declaration never completed
    E1002,
    /// Generic parameter reached layout
    E1003,
    /// Aggregate size overflows
    E1004,
    /// `void` used by value inside an aggregate
    E1005,

    // Generic Errors (E2xxx)
    /// Wrong number of type arguments
    E2001,
    /// Type parameter not bound at the use site
    E2002,
    /// Unknown type name
    E2003,
    /// Instantiation depth limit exceeded
    E2004,
    /// Synthesized instance name already taken
    E2005,
    /// Type arguments applied to a non-generic definition
    E2006,

    // Interface Errors (E3xxx)
    /// Implementer lacks an interface method
    E3001,
    /// Composed interfaces declare the same method differently
    E3002,
    /// Implementer method signature differs from the interface
    E3003,
    /// Unknown interface name
    E3004,
    /// Dispatch of a method the interface does not declare
    E3005,
    /// Implementer was never completed
    E3006,
    /// Interface embeds itself
    E3007,

    // Constant Errors (E4xxx)
    /// Constants depend on each other in a cycle
    E4001,
    /// Division or remainder by zero
    E4002,
    /// Integer overflow during folding
    E4003,
    /// Operand types do not fit the operator
    E4004,
    /// Unknown constant name
    E4005,
    /// Expression is not a compile-time constant
    E4006,
    /// Array length folded to a negative value
    E4007,

    // ABI Errors (E5xxx)
    /// Aggregate classification for an unsupported target
    E5001,

    // Lowering Errors (E6xxx)
    /// Unknown local variable
    E6001,
    /// Unknown function
    E6002,
    /// Unknown struct field
    E6003,
    /// `try` in a function that does not return an error union
    E6004,
    /// Two error names share an error id
    E6005,
    /// Array index is not an integer
    E6006,
    /// Expression type does not match its context
    E6007,
    /// Wrong number of call arguments
    E6008,
    /// Value does not support the requested operation
    E6009,
    /// Union payload read without a dominating zero check
    E6010,
    /// Duplicate definition
    E6011,
    /// `break`/`continue` outside a loop
    E6012,
    /// `return`, `try` or a loop exit leaving a `defer` body
    E6013,

    // Internal Errors (E9xxx)
    /// Internal compiler error
    E9001,
}

impl ErrorCode {
    /// Get the numeric code as a string (e.g., "E1001").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Layout
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            // Generics
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            // Interfaces
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E3005 => "E3005",
            ErrorCode::E3006 => "E3006",
            ErrorCode::E3007 => "E3007",
            // Constants
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E4004 => "E4004",
            ErrorCode::E4005 => "E4005",
            ErrorCode::E4006 => "E4006",
            ErrorCode::E4007 => "E4007",
            // ABI
            ErrorCode::E5001 => "E5001",
            // Lowering
            ErrorCode::E6001 => "E6001",
            ErrorCode::E6002 => "E6002",
            ErrorCode::E6003 => "E6003",
            ErrorCode::E6004 => "E6004",
            ErrorCode::E6005 => "E6005",
            ErrorCode::E6006 => "E6006",
            ErrorCode::E6007 => "E6007",
            ErrorCode::E6008 => "E6008",
            ErrorCode::E6009 => "E6009",
            ErrorCode::E6010 => "E6010",
            ErrorCode::E6011 => "E6011",
            ErrorCode::E6012 => "E6012",
            ErrorCode::E6013 => "E6013",
            // Internal
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Check if this is a layout error (E1xxx range).
    pub fn is_layout_error(&self) -> bool {
        self.as_str().starts_with("E1")
    }

    /// Check if this is an internal compiler error (E9xxx range).
    pub fn is_internal(&self) -> bool {
        self.as_str().starts_with("E9")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
