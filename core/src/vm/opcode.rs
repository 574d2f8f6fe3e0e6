//! Instruction set. Byte values are positions in the declaration below.

use std::fmt;

use once_cell::sync::Lazy;

use crate::util::fast_map::{FastHashMap, fast_hash_map_with_capacity};

/// Inline operands following the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    /// One raw byte (`PUSHB`).
    Byte,
    Vint,
    TwoVints,
    ThreeVints,
}

macro_rules! opcodes {
    ($($name:ident => $operands:ident),* $(,)?) => {
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name),*
        }

        const ALL_OPCODES: &[Opcode] = &[$(Opcode::$name),*];

        impl Opcode {
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name)),*
                }
            }

            pub fn operands(self) -> Operands {
                match self {
                    $(Opcode::$name => Operands::$operands),*
                }
            }
        }
    };
}

opcodes! {
    PUSHB => Byte,
    PUSHN => Vint,
    PUSHS => Vint,
    PUSHY => Vint,
    PUSHPG => Vint,
    PUSHPPG => Vint,
    PUSHPMG => TwoVints,
    PUSHPL => Vint,
    PUSHPOL => TwoVints,
    PUSHI => Vint,
    LOADB => None,
    LOADN => None,
    LOADS => None,
    LOADY => None,
    LOADA => None,
    LOADD => None,
    LOADP => None,
    LOADJ => None,
    LOADV => None,
    STOREB => None,
    STOREN => None,
    STORES => None,
    STOREY => None,
    STOREA => None,
    STORED => None,
    STOREP => None,
    STOREJ => None,
    STOREV => None,
    NEGN => None,
    ADDN => None,
    SUBN => None,
    MULN => None,
    DIVN => None,
    MODN => None,
    EXPN => None,
    EQB => None,
    NEB => None,
    EQN => None,
    NEN => None,
    LTN => None,
    GTN => None,
    LEN => None,
    GEN => None,
    EQS => None,
    NES => None,
    LTS => None,
    GTS => None,
    LES => None,
    GES => None,
    EQY => None,
    NEY => None,
    LTY => None,
    GTY => None,
    LEY => None,
    GEY => None,
    EQA => None,
    NEA => None,
    EQD => None,
    NED => None,
    EQP => None,
    NEP => None,
    EQV => None,
    NEV => None,
    ANDB => None,
    ORB => None,
    NOTB => None,
    INDEXAR => None,
    INDEXAW => None,
    INDEXAV => None,
    INDEXAN => None,
    INDEXDR => None,
    INDEXDW => None,
    INDEXDV => None,
    INA => None,
    IND => None,
    CALLP => Vint,
    CALLF => Vint,
    CALLMF => TwoVints,
    CALLI => None,
    JUMP => Vint,
    JF => Vint,
    JT => Vint,
    DUP => None,
    DUPX1 => None,
    DROP => None,
    RET => None,
    CONSA => Vint,
    CONSD => Vint,
    EXCEPT => Vint,
    ALLOC => Vint,
    PUSHNIL => None,
    RESETC => None,
    PUSHPEG => Vint,
    JUMPTBL => Vint,
    CALLX => ThreeVints,
    SWAP => None,
    DROPN => Vint,
    PUSHFP => Vint,
    CALLV => Vint,
    PUSHCI => Vint,
}

static OPCODES_BY_NAME: Lazy<FastHashMap<&'static str, Opcode>> = Lazy::new(|| {
    let mut map = fast_hash_map_with_capacity(ALL_OPCODES.len());
    for op in ALL_OPCODES {
        map.insert(op.name(), *op);
    }
    map
});

/// Width of one `JUMPTBL` slot: a `JUMP` byte plus a padded 5-byte vint.
pub const JUMP_TABLE_SLOT: usize = 6;

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        ALL_OPCODES.get(byte as usize).copied()
    }

    /// Looks an opcode up by mnemonic, case-sensitive.
    pub fn from_name(name: &str) -> Option<Opcode> {
        OPCODES_BY_NAME.get(name).copied()
    }

    pub fn all() -> &'static [Opcode] {
        ALL_OPCODES
    }
}

impl TryFrom<u8> for Opcode {
    type Error = anyhow::Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::from_byte(byte).ok_or_else(|| anyhow::anyhow!("unknown opcode {}", byte))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
