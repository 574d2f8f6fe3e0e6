//! Module construction: a programmatic [`ModuleBuilder`] and a small
//! line-oriented assembler on top of it.
//!
//! Assembler syntax, one item per line, `;` starts a comment:
//!
//! ```text
//! .globals 2
//! .function add 1 2 2 add_entry      ; name nest params locals entry-label
//! .handler try_start try_end "NumberException" on_error
//! .class Shape area | name            ; interfaces separated by `|`
//!     PUSHI 2
//!     PUSHS "hello"
//!     PUSHY x"00ff"
//!     JF done
//!     CALLF add
//!     JUMPTBL case0 case1
//! done:
//! ```

use std::collections::hash_map::Entry;

use anyhow::{Context, Result, anyhow, bail, ensure};

use crate::util::fast_map::{FastHashMap, fast_hash_map_new};
use crate::vm::{ClassInfo, ExceptionRange, FunctionInfo, HASH_LEN, Module, Opcode, Operands, write_vint};

/// Width of a label reference: vints padded with `0x80` to a fixed size.
const LABEL_WIDTH: usize = 5;

fn write_padded_vint(out: &mut [u8], value: usize) {
    let mut rest = value;
    for i in (0..LABEL_WIDTH).rev() {
        let continuation = if i == LABEL_WIDTH - 1 { 0 } else { 0x80 };
        out[i] = continuation | (rest & 0x7f) as u8;
        rest >>= 7;
    }
}

#[derive(Debug, Clone)]
struct PendingFunction {
    name: usize,
    nesting_depth: usize,
    param_count: usize,
    local_count: usize,
    entry: String,
}

#[derive(Debug, Clone)]
struct PendingHandler {
    start: String,
    end: String,
    name: usize,
    handler: String,
}

/// Incrementally builds a [`Module`], resolving code labels at the end.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    global_size: usize,
    strings: Vec<Vec<u8>>,
    interned: FastHashMap<Vec<u8>, usize>,
    functions: Vec<PendingFunction>,
    handlers: Vec<PendingHandler>,
    classes: Vec<ClassInfo>,
    code: Vec<u8>,
    labels: FastHashMap<String, usize>,
    fixups: Vec<(usize, String)>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            interned: fast_hash_map_new(),
            labels: fast_hash_map_new(),
            ..Self::default()
        }
    }

    /// Current code offset.
    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn globals(&mut self, count: usize) -> &mut Self {
        self.global_size = count;
        self
    }

    /// Interns a string-table entry.
    pub fn string(&mut self, s: &str) -> usize {
        self.bytes(s.as_bytes())
    }

    pub fn bytes(&mut self, raw: &[u8]) -> usize {
        match self.interned.entry(raw.to_vec()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                self.strings.push(raw.to_vec());
                *e.insert(self.strings.len() - 1)
            }
        }
    }

    /// Declares a function whose body starts at `entry`; returns its index.
    pub fn function(&mut self, name: &str, nesting_depth: usize, params: usize, locals: usize, entry: &str) -> usize {
        let name = self.string(name);
        self.functions.push(PendingFunction {
            name,
            nesting_depth,
            param_count: params,
            local_count: locals,
            entry: entry.to_string(),
        });
        self.functions.len() - 1
    }

    /// Registers a handler for `name` covering `[start, end)`.
    pub fn handler(&mut self, start: &str, end: &str, name: &str, handler: &str) -> &mut Self {
        let name = self.string(name);
        self.handlers.push(PendingHandler {
            start: start.to_string(),
            end: end.to_string(),
            name,
            handler: handler.to_string(),
        });
        self
    }

    pub fn class(&mut self, name: &str, interfaces: Vec<Vec<usize>>) -> usize {
        let name = self.string(name);
        self.classes.push(ClassInfo { name, interfaces });
        self.classes.len() - 1
    }

    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        let at = self.code.len();
        match self.labels.entry(name.to_string()) {
            Entry::Occupied(_) => bail!("label {} defined twice", name),
            Entry::Vacant(e) => {
                e.insert(at);
            }
        }
        Ok(self)
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    pub fn op_byte(&mut self, op: Opcode, value: u8) -> &mut Self {
        self.code.push(op as u8);
        self.code.push(value);
        self
    }

    pub fn op_vint(&mut self, op: Opcode, value: usize) -> &mut Self {
        self.op_vints(op, &[value])
    }

    pub fn op_vints(&mut self, op: Opcode, values: &[usize]) -> &mut Self {
        self.code.push(op as u8);
        for &v in values {
            write_vint(&mut self.code, v);
        }
        self
    }

    /// Emits `op` with the string-table index of `s`.
    pub fn op_str(&mut self, op: Opcode, s: &str) -> &mut Self {
        let index = self.string(s);
        self.op_vint(op, index)
    }

    /// Emits `op` whose single operand is the address of `label`.
    pub fn op_label(&mut self, op: Opcode, label: &str) -> &mut Self {
        self.code.push(op as u8);
        self.label_ref(label);
        self
    }

    fn label_ref(&mut self, label: &str) {
        self.fixups.push((self.code.len(), label.to_string()));
        self.code.extend_from_slice(&[0u8; LABEL_WIDTH]);
    }

    /// `JUMPTBL` followed by one `JUMP` slot per target.
    pub fn jump_table(&mut self, targets: &[&str]) -> &mut Self {
        self.op_vint(Opcode::JUMPTBL, targets.len());
        for target in targets {
            self.op_label(Opcode::JUMP, target);
        }
        self
    }

    fn resolve(&self, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| anyhow!("undefined label {}", label))
    }

    pub fn build(&self) -> Result<Module> {
        let mut code = self.code.clone();
        for (at, label) in &self.fixups {
            let target = self.resolve(label)?;
            write_padded_vint(&mut code[*at..*at + LABEL_WIDTH], target);
        }

        let functions = self
            .functions
            .iter()
            .map(|f| {
                Ok(FunctionInfo {
                    name: f.name,
                    nesting_depth: f.nesting_depth,
                    param_count: f.param_count,
                    local_count: f.local_count,
                    entry: self.resolve(&f.entry)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exceptions = self
            .handlers
            .iter()
            .map(|h| {
                Ok(ExceptionRange {
                    start: self.resolve(&h.start)?,
                    end: self.resolve(&h.end)?,
                    handler_name: h.name,
                    handler: self.resolve(&h.handler)?,
                    stack_depth: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for class in &self.classes {
            for &f in class.interfaces.iter().flatten() {
                ensure!(f < functions.len(), "class method refers to undeclared function {}", f);
            }
        }

        Ok(Module {
            source_hash: [0u8; HASH_LEN],
            global_size: self.global_size,
            strings: self
                .strings
                .iter()
                .map(|raw| String::from_utf8_lossy(raw).into_owned())
                .collect(),
            bytestrings: self.strings.clone(),
            imports: Vec::new(),
            functions,
            exceptions,
            classes: self.classes.clone(),
            code,
        })
    }
}

/// Splits a line into tokens; quoted strings stay whole, `;` ends the line.
fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == ';' {
            break;
        }
        let mut token = String::new();
        if c == 'x' {
            token.push(c);
            chars.next();
        }
        if chars.peek() == Some(&'"') {
            token.push('"');
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        let escaped = chars.next().ok_or_else(|| anyhow!("dangling escape"))?;
                        token.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    c => token.push(c),
                }
            }
            ensure!(closed, "unterminated string literal");
            token.push('"');
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == ';' {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    Ok(tokens)
}

fn parse_usize(token: &str) -> Result<usize> {
    token.parse().with_context(|| format!("expected a number, found {}", token))
}

fn hex_literal(body: &str) -> Result<Vec<u8>> {
    let digits: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    ensure!(digits.len() % 2 == 0, "odd number of hex digits in x\"{}\"", body);
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).with_context(|| format!("bad hex byte {}", &digits[i..i + 2])))
        .collect()
}

struct Assembler {
    builder: ModuleBuilder,
    function_names: FastHashMap<String, usize>,
}

impl Assembler {
    fn function_index(&self, name: &str) -> Result<usize> {
        if let Ok(n) = name.parse() {
            return Ok(n);
        }
        self.function_names
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown function {}", name))
    }

    /// Resolves a non-label operand: number, `"string"` or `x"bytes"`.
    fn value(&mut self, op: Opcode, token: &str) -> Result<usize> {
        if let Some(body) = token.strip_prefix("x\"").and_then(|t| t.strip_suffix('"')) {
            let raw = hex_literal(body)?;
            return Ok(self.builder.bytes(&raw));
        }
        if let Some(body) = token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            return Ok(self.builder.string(body));
        }
        if matches!(op, Opcode::CALLF | Opcode::PUSHFP) {
            return self.function_index(token);
        }
        parse_usize(token)
    }

    fn directive(&mut self, tokens: &[String]) -> Result<()> {
        let args = &tokens[1..];
        match tokens[0].as_str() {
            ".globals" => {
                ensure!(args.len() == 1, ".globals takes a count");
                self.builder.globals(parse_usize(&args[0])?);
            }
            ".function" => {
                ensure!(args.len() == 5, ".function takes name, nest, params, locals and entry label");
                self.builder.function(
                    &args[0],
                    parse_usize(&args[1])?,
                    parse_usize(&args[2])?,
                    parse_usize(&args[3])?,
                    &args[4],
                );
            }
            ".handler" => {
                ensure!(args.len() == 4, ".handler takes start, end, \"name\" and handler label");
                let name = args[2].trim_matches('"');
                self.builder.handler(&args[0], &args[1], name, &args[3]);
            }
            ".class" => {
                ensure!(!args.is_empty(), ".class takes a name");
                let mut interfaces = Vec::new();
                if args.len() > 1 {
                    let mut current = Vec::new();
                    for token in &args[1..] {
                        if token == "|" {
                            interfaces.push(std::mem::take(&mut current));
                        } else {
                            current.push(self.function_index(token)?);
                        }
                    }
                    interfaces.push(current);
                }
                self.builder.class(&args[0], interfaces);
            }
            other => bail!("unknown directive {}", other),
        }
        Ok(())
    }

    fn instruction(&mut self, tokens: &[String]) -> Result<()> {
        let op = Opcode::from_name(&tokens[0]).ok_or_else(|| anyhow!("unknown opcode {}", tokens[0]))?;
        let args = &tokens[1..];
        if op == Opcode::JUMPTBL {
            let targets: Vec<&str> = args.iter().map(String::as_str).collect();
            self.builder.jump_table(&targets);
            return Ok(());
        }
        let expected = match op.operands() {
            Operands::None => 0,
            Operands::Byte | Operands::Vint => 1,
            Operands::TwoVints => 2,
            Operands::ThreeVints => 3,
        };
        ensure!(
            args.len() == expected,
            "{} takes {} operand(s), found {}",
            op,
            expected,
            args.len()
        );
        match op.operands() {
            Operands::None => {
                self.builder.op(op);
            }
            Operands::Byte => {
                let b = match args[0].as_str() {
                    "TRUE" => 1,
                    "FALSE" => 0,
                    other => other.parse().with_context(|| format!("expected a byte, found {}", other))?,
                };
                self.builder.op_byte(op, b);
            }
            _ if matches!(op, Opcode::JUMP | Opcode::JF | Opcode::JT) && args[0].parse::<usize>().is_err() => {
                self.builder.op_label(op, &args[0]);
            }
            _ => {
                let values = args
                    .iter()
                    .map(|t| self.value(op, t))
                    .collect::<Result<Vec<_>>>()?;
                self.builder.op_vints(op, &values);
            }
        }
        Ok(())
    }
}

/// Assembles source text into a module.
pub fn assemble(source: &str) -> Result<Module> {
    let mut asm = Assembler {
        builder: ModuleBuilder::new(),
        function_names: fast_hash_map_new(),
    };

    let lines = source
        .lines()
        .enumerate()
        .map(|(i, line)| tokenize(line).with_context(|| format!("line {}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    // Function indices follow declaration order, so names resolve before use.
    for tokens in &lines {
        if tokens.first().map(String::as_str) == Some(".function") && tokens.len() > 1 {
            let index = asm.function_names.len();
            asm.function_names.entry(tokens[1].clone()).or_insert(index);
        }
    }

    for (i, tokens) in lines.iter().enumerate() {
        let Some(first) = tokens.first() else {
            continue;
        };
        let result = if let Some(label) = first.strip_suffix(':') {
            ensure!(tokens.len() == 1, "line {}: label must stand alone", i + 1);
            asm.builder.label(label).map(|_| ())
        } else if first.starts_with('.') {
            asm.directive(tokens)
        } else {
            asm.instruction(tokens)
        };
        result.with_context(|| format!("line {}", i + 1))?;
    }
    asm.builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{decode_module, encode_module, read_vint};

    #[test]
    fn padded_label_references_decode_as_vints() {
        let mut buf = [0u8; LABEL_WIDTH];
        write_padded_vint(&mut buf, 300);
        let mut cursor = 0;
        assert_eq!(read_vint(&buf, &mut cursor).unwrap(), 300);
        assert_eq!(cursor, LABEL_WIDTH);
    }

    #[test]
    fn jump_table_slots_are_six_bytes() {
        let mut b = ModuleBuilder::new();
        b.jump_table(&["a", "b"]);
        b.label("a").unwrap();
        b.label("b").unwrap();
        let module = b.build().unwrap();
        // JUMPTBL 2, then two JUMP slots.
        assert_eq!(module.code.len(), 2 + 2 * crate::vm::JUMP_TABLE_SLOT);
    }

    #[test]
    fn assembles_tables_and_code() {
        let module = assemble(
            r#"
            .globals 1
            .function twice 1 1 1 twice_entry
            .handler start end "Foo" catch
            .class Shape twice | twice
            start:
                PUSHI 21
                CALLF twice
                PUSHS "hi" ; comment
                PUSHY x"00 ff"
                PUSHB TRUE
            end:
                JUMP done
            catch:
                DROP
            twice_entry:
                RET
            done:
            "#,
        )
        .unwrap();
        assert_eq!(module.global_size, 1);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.string(module.functions[0].name), Some("twice"));
        assert_eq!(module.exceptions[0].start, 0);
        assert_eq!(module.string(module.exceptions[0].handler_name), Some("Foo"));
        assert_eq!(module.classes[0].interfaces, vec![vec![0], vec![0]]);
        assert!(module.bytestrings.contains(&vec![0x00, 0xff]));
        assert_eq!(module.code[0], Opcode::PUSHI as u8);

        let decoded = decode_module(&encode_module(&module)).unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn reports_line_of_error() {
        let err = assemble("PUSHI 1\nFROB 2\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));

        let err = assemble("JUMP nowhere\n").unwrap_err();
        assert!(err.to_string().contains("undefined label nowhere"));

        assert!(assemble("PUSHI\n").is_err());
        assert!(assemble("PUSHS \"open\n").is_err());
    }
}
