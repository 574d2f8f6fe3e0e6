//! Human-readable listings of loaded modules.

use std::fmt::Write;

use crate::val::quote_string;
use crate::vm::{Module, Opcode, Operands, read_vint};

/// Operands that name a string-table entry.
fn is_string_operand(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::PUSHN
            | Opcode::PUSHS
            | Opcode::PUSHY
            | Opcode::PUSHPPG
            | Opcode::CALLP
            | Opcode::EXCEPT
            | Opcode::PUSHCI
    )
}

fn annotate(module: &Module, op: Opcode, value: usize) -> String {
    if is_string_operand(op) {
        return match (op, module.string(value)) {
            (Opcode::PUSHY, _) if value < module.bytestrings.len() => {
                let hex: Vec<String> = module.bytestrings[value].iter().map(|b| format!("{:02x}", b)).collect();
                format!("{} ; {}", value, hex.join(" "))
            }
            (_, Some(s)) => format!("{} ; {}", value, quote_string(s)),
            (_, None) => format!("{} ; <bad string index>", value),
        };
    }
    if matches!(op, Opcode::CALLF | Opcode::PUSHFP)
        && let Some(name) = module.function_name(value)
    {
        return format!("{} ; {}", value, name);
    }
    value.to_string()
}

/// Renders the instruction at `ip` and returns the offset of the next one.
///
/// Never fails: undecodable bytes render as `??` and consume one byte.
pub fn disassemble_instruction(module: &Module, ip: usize) -> (String, usize) {
    let code = &module.code;
    let Some(&byte) = code.get(ip) else {
        return (format!("{:6}  <end>", ip), ip);
    };
    let Some(op) = Opcode::from_byte(byte) else {
        return (format!("{:6}  ?? {:#04x}", ip, byte), ip + 1);
    };

    let mut cursor = ip + 1;
    let mut text = format!("{:6}  {}", ip, op);
    let vints = match op.operands() {
        Operands::None => 0,
        Operands::Byte => {
            match code.get(cursor) {
                Some(b) => {
                    let _ = write!(text, " {}", b);
                    cursor += 1;
                }
                None => text.push_str(" <truncated>"),
            }
            0
        }
        Operands::Vint => 1,
        Operands::TwoVints => 2,
        Operands::ThreeVints => 3,
    };
    for i in 0..vints {
        match read_vint(code, &mut cursor) {
            Ok(v) if i == 0 && vints == 1 => {
                let _ = write!(text, " {}", annotate(module, op, v));
            }
            Ok(v) => {
                let _ = write!(text, " {}", v);
            }
            Err(_) => {
                text.push_str(" <truncated>");
                return (text, code.len());
            }
        }
    }
    (text, cursor)
}

/// Full listing: tables, then every instruction in order.
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "globals: {}", module.global_size);

    let _ = writeln!(out, "strings: {}", module.strings.len());
    for (i, s) in module.strings.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", i, quote_string(s));
    }

    if !module.imports.is_empty() {
        let _ = writeln!(out, "imports: {}", module.imports.len());
        for import in &module.imports {
            let name = module.string(import.name).unwrap_or("?");
            let optional = if import.optional { " (optional)" } else { "" };
            let _ = writeln!(out, "  {}{}", name, optional);
        }
    }

    let _ = writeln!(out, "functions: {}", module.functions.len());
    for (i, f) in module.functions.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{}] {} nest={} params={} locals={} entry={}",
            i,
            module.string(f.name).unwrap_or("?"),
            f.nesting_depth,
            f.param_count,
            f.local_count,
            f.entry
        );
    }

    let _ = writeln!(out, "exceptions: {}", module.exceptions.len());
    for e in &module.exceptions {
        let _ = writeln!(
            out,
            "  {}..{} {} -> {}",
            e.start,
            e.end,
            module.string(e.handler_name).unwrap_or("?"),
            e.handler
        );
    }

    if !module.classes.is_empty() {
        let _ = writeln!(out, "classes: {}", module.classes.len());
        for c in &module.classes {
            let interfaces: Vec<String> = c
                .interfaces
                .iter()
                .map(|methods| {
                    let names: Vec<&str> = methods.iter().map(|&m| module.function_name(m).unwrap_or("?")).collect();
                    format!("[{}]", names.join(" "))
                })
                .collect();
            let _ = writeln!(out, "  {} {}", module.string(c.name).unwrap_or("?"), interfaces.join(" "));
        }
    }

    let _ = writeln!(out, "code: {} bytes", module.code.len());
    let mut ip = 0;
    while ip < module.code.len() {
        let (line, next) = disassemble_instruction(module, ip);
        out.push_str(&line);
        out.push('\n');
        ip = next;
    }
    out
}
