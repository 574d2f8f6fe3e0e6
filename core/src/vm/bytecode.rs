//! Compiled module format and loader.
//!
//! A module is a fixed sequence of tables followed by the raw instruction
//! stream. All integers are "vints": big-endian groups of 7 bits, with the
//! high bit set on every byte except the last.

use std::fmt;

pub const MAGIC: [u8; 4] = [0x4e, 0x65, 0x00, 0x6e];
pub const HASH_LEN: usize = 32;

/// Export sections this loader requires to be empty, in file order.
const EXPORT_SECTIONS: [&str; 6] = [
    "types",
    "constants",
    "variables",
    "functions",
    "exceptions",
    "interfaces",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// Bad magic, truncated stream or out-of-range table reference.
    Malformed(String),
    /// Well-formed but uses a feature this executor does not implement.
    Unsupported(String),
    /// A vint needs more than 32 bits.
    IntegerOverflow { offset: usize },
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleError::Malformed(msg) => write!(f, "malformed module: {}", msg),
            ModuleError::Unsupported(msg) => write!(f, "unsupported module: {}", msg),
            ModuleError::IntegerOverflow { offset } => {
                write!(f, "integer overflow in encoded integer at offset {}", offset)
            }
        }
    }
}

impl std::error::Error for ModuleError {}

type LoadResult<T> = std::result::Result<T, ModuleError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: usize,
    pub nesting_depth: usize,
    pub param_count: usize,
    pub local_count: usize,
    pub entry: usize,
}

/// Handler table entry covering `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRange {
    pub start: usize,
    pub end: usize,
    pub handler_name: usize,
    pub handler: usize,
    /// Kept for format compatibility; the handler search does not read it.
    pub stack_depth: usize,
}

/// Per-class interface tables: `interfaces[i][slot]` is a function index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: usize,
    pub interfaces: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub name: usize,
    pub optional: bool,
    pub hash: [u8; HASH_LEN],
}

/// Loaded module. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub source_hash: [u8; HASH_LEN],
    pub global_size: usize,
    /// String table decoded as text (lossy for invalid UTF-8).
    pub strings: Vec<String>,
    /// The same table as raw bytes.
    pub bytestrings: Vec<Vec<u8>>,
    pub imports: Vec<Import>,
    pub functions: Vec<FunctionInfo>,
    pub exceptions: Vec<ExceptionRange>,
    pub classes: Vec<ClassInfo>,
    pub code: Vec<u8>,
}

impl Module {
    pub fn string(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn function_name(&self, index: usize) -> Option<&str> {
        self.functions.get(index).and_then(|f| self.string(f.name))
    }
}

/// Reads one vint at `cursor`.
pub fn read_vint(bytes: &[u8], cursor: &mut usize) -> LoadResult<usize> {
    let start = *cursor;
    let mut r: u32 = 0;
    loop {
        let x = read_u8(bytes, cursor)?;
        if r & 0xff00_0000 != 0 {
            return Err(ModuleError::IntegerOverflow { offset: start });
        }
        r = (r << 7) | u32::from(x & 0x7f);
        if x & 0x80 == 0 {
            break;
        }
    }
    Ok(r as usize)
}

pub fn write_vint(out: &mut Vec<u8>, value: usize) {
    let mut groups = vec![(value & 0x7f) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        groups.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    out.extend(groups.iter().rev());
}

fn read_u8(bytes: &[u8], cursor: &mut usize) -> LoadResult<u8> {
    if *cursor >= bytes.len() {
        return Err(ModuleError::Malformed(format!(
            "unexpected end of input at offset {}",
            cursor
        )));
    }
    let value = bytes[*cursor];
    *cursor += 1;
    Ok(value)
}

fn read_slice<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize, what: &str) -> LoadResult<&'a [u8]> {
    let end = cursor.checked_add(len).filter(|&end| end <= bytes.len());
    match end {
        Some(end) => {
            let slice = &bytes[*cursor..end];
            *cursor = end;
            Ok(slice)
        }
        None => Err(ModuleError::Malformed(format!(
            "unexpected end of input while reading {}",
            what
        ))),
    }
}

fn read_hash(bytes: &[u8], cursor: &mut usize, what: &str) -> LoadResult<[u8; HASH_LEN]> {
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(read_slice(bytes, cursor, HASH_LEN, what)?);
    Ok(hash)
}

fn read_string_table(blob: &[u8]) -> LoadResult<Vec<Vec<u8>>> {
    let mut entries = Vec::new();
    let mut cursor = 0;
    while cursor < blob.len() {
        let len = read_vint(blob, &mut cursor)?;
        entries.push(read_slice(blob, &mut cursor, len, "string table entry")?.to_vec());
    }
    Ok(entries)
}

fn check_string_index(module: &Module, index: usize, what: &str) -> LoadResult<()> {
    if index >= module.strings.len() {
        return Err(ModuleError::Malformed(format!(
            "{} refers to string {} but the table has {} entries",
            what,
            index,
            module.strings.len()
        )));
    }
    Ok(())
}

/// Decodes a compiled module.
pub fn decode_module(bytes: &[u8]) -> LoadResult<Module> {
    let mut cursor = 0;
    if bytes.len() >= MAGIC.len() && bytes[..MAGIC.len()] == MAGIC {
        cursor = MAGIC.len();
    }
    let mut module = Module {
        source_hash: read_hash(bytes, &mut cursor, "source hash")?,
        ..Module::default()
    };
    module.global_size = read_vint(bytes, &mut cursor)?;

    let table_len = read_vint(bytes, &mut cursor)?;
    let blob = read_slice(bytes, &mut cursor, table_len, "string table")?;
    module.bytestrings = read_string_table(blob)?;
    module.strings = module
        .bytestrings
        .iter()
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .collect();

    for section in EXPORT_SECTIONS {
        let size = read_vint(bytes, &mut cursor)?;
        if size != 0 {
            return Err(ModuleError::Unsupported(format!(
                "{} exported {}",
                size, section
            )));
        }
    }

    let import_count = read_vint(bytes, &mut cursor)?;
    for _ in 0..import_count {
        let name = read_vint(bytes, &mut cursor)?;
        let optional = read_vint(bytes, &mut cursor)? != 0;
        let hash = read_hash(bytes, &mut cursor, "import hash")?;
        module.imports.push(Import { name, optional, hash });
    }

    let function_count = read_vint(bytes, &mut cursor)?;
    for _ in 0..function_count {
        module.functions.push(FunctionInfo {
            name: read_vint(bytes, &mut cursor)?,
            nesting_depth: read_vint(bytes, &mut cursor)?,
            param_count: read_vint(bytes, &mut cursor)?,
            local_count: read_vint(bytes, &mut cursor)?,
            entry: read_vint(bytes, &mut cursor)?,
        });
    }

    let exception_count = read_vint(bytes, &mut cursor)?;
    for _ in 0..exception_count {
        module.exceptions.push(ExceptionRange {
            start: read_vint(bytes, &mut cursor)?,
            end: read_vint(bytes, &mut cursor)?,
            handler_name: read_vint(bytes, &mut cursor)?,
            handler: read_vint(bytes, &mut cursor)?,
            stack_depth: read_vint(bytes, &mut cursor)?,
        });
    }

    let class_count = read_vint(bytes, &mut cursor)?;
    for _ in 0..class_count {
        let name = read_vint(bytes, &mut cursor)?;
        let interface_count = read_vint(bytes, &mut cursor)?;
        let mut interfaces = Vec::new();
        for _ in 0..interface_count {
            let method_count = read_vint(bytes, &mut cursor)?;
            let mut methods = Vec::new();
            for _ in 0..method_count {
                methods.push(read_vint(bytes, &mut cursor)?);
            }
            interfaces.push(methods);
        }
        module.classes.push(ClassInfo { name, interfaces });
    }

    module.code = bytes[cursor..].to_vec();

    for f in &module.functions {
        check_string_index(&module, f.name, "function name")?;
    }
    for e in &module.exceptions {
        check_string_index(&module, e.handler_name, "exception handler")?;
    }
    for c in &module.classes {
        check_string_index(&module, c.name, "class name")?;
        for &f in c.interfaces.iter().flatten() {
            if f >= module.functions.len() {
                return Err(ModuleError::Malformed(format!(
                    "class method refers to function {} but only {} exist",
                    f,
                    module.functions.len()
                )));
            }
        }
    }

    tracing::debug!(
        target: "neonx::loader",
        strings = module.strings.len(),
        functions = module.functions.len(),
        exceptions = module.exceptions.len(),
        classes = module.classes.len(),
        code_len = module.code.len(),
        "module decoded"
    );
    Ok(module)
}

/// Serializes a module in the layout [`decode_module`] reads, magic included.
pub fn encode_module(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&module.source_hash);
    write_vint(&mut out, module.global_size);

    let mut table = Vec::new();
    for entry in &module.bytestrings {
        write_vint(&mut table, entry.len());
        table.extend_from_slice(entry);
    }
    write_vint(&mut out, table.len());
    out.extend_from_slice(&table);

    for _ in EXPORT_SECTIONS {
        write_vint(&mut out, 0);
    }

    write_vint(&mut out, module.imports.len());
    for import in &module.imports {
        write_vint(&mut out, import.name);
        write_vint(&mut out, usize::from(import.optional));
        out.extend_from_slice(&import.hash);
    }

    write_vint(&mut out, module.functions.len());
    for f in &module.functions {
        for v in [f.name, f.nesting_depth, f.param_count, f.local_count, f.entry] {
            write_vint(&mut out, v);
        }
    }

    write_vint(&mut out, module.exceptions.len());
    for e in &module.exceptions {
        for v in [e.start, e.end, e.handler_name, e.handler, e.stack_depth] {
            write_vint(&mut out, v);
        }
    }

    write_vint(&mut out, module.classes.len());
    for c in &module.classes {
        write_vint(&mut out, c.name);
        write_vint(&mut out, c.interfaces.len());
        for methods in &c.interfaces {
            write_vint(&mut out, methods.len());
            for &m in methods {
                write_vint(&mut out, m);
            }
        }
    }

    out.extend_from_slice(&module.code);
    out
}
