//! Statement grammar shared by the compiler and nested statement bodies
//!
//! Classification order is fixed: declaration, assembly, conditional, print.
//! A statement that matches none of them is unrecognized.

use std::sync::OnceLock;

use regex::Regex;

use super::instruction::{ArithOp, Fault, Loop, Op, PrintItem, Statement, StatementKind};
use super::operand::{Address, Cell, Comparison, Condition, Index, Operand, Place};

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($re).expect("grammar pattern is valid"))
        }
    };
}

pattern!(assembly_re, r"^(?P<mnemonic>[A-Za-z][A-Za-z-]*)\s+(?P<rest>\S.*)$");
pattern!(conditional_re, r"^if\s+(?P<cond>.+?)\s+then(?:\s+(?P<body>.+))?$");
pattern!(literal_re, r"^-?[0-9]+$");
pattern!(register_re, r"^[A-Za-z_][A-Za-z0-9_]*$");
pattern!(function_name_re, r"^[A-Za-z_][A-Za-z0-9_-]*$");
pattern!(
    array_cell_re,
    r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\[(?P<index>[^\[\]{}]+)\]$"
);
pattern!(
    dict_cell_re,
    r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\{(?P<key>[A-Za-z0-9_.-]+)\}$"
);
pattern!(
    condition_re,
    r"^(?P<lhs>[^\s,<>=!]+)\s*(?:(?P<cmp>==|!=|<=|>=|<|>)\s*(?P<rhs>[^\s,<>=!]+))?$"
);
pattern!(
    variable_re,
    r"^declare\s+(?P<ty>[A-Za-z_][A-Za-z0-9_]*)\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?:\s*=\s*(?P<init>.+))?$"
);
pattern!(loop_for_re, r"^(?P<count>[^\s,]+)[\s,]+(?P<body>\S.*)$");
pattern!(
    loop_cond_re,
    r"^(?P<cond>[^\s,<>=!]+(?:\s*(?:==|!=|<=|>=|<|>)\s*[^\s,<>=!]+)?)\s+(?P<body>\S.*)$"
);

/// Deepest statement nesting accepted inside `if ... then` and loop bodies
pub const MAX_NESTING: usize = 64;

/// Prefix that introduces a declaration
pub const DECLARE_PREFIX: &str = "declare";

/// Prefix that introduces a print statement
pub const PRINT_PREFIX: &str = "print";

/// Split source into `(line number, statement)` pairs.
///
/// Lines are numbered from 1. A line may hold several statements separated
/// by `;` (outside string literals); each is trimmed and empty ones are
/// dropped.
pub fn statements(source: &str) -> impl Iterator<Item = (u32, &str)> {
    source.lines().enumerate().flat_map(|(index, line)| {
        let line_no = u32::try_from(index + 1).unwrap_or(u32::MAX);
        line_statements(line).map(move |stmt| (line_no, stmt))
    })
}

/// The trimmed, non-empty statements of a single line
pub fn line_statements(line: &str) -> impl Iterator<Item = &str> {
    split_statements(line)
        .into_iter()
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
}

fn split_statements(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&line[start..]);
    parts
}

/// If `text` is `declare function <name>`, return the (unvalidated) name
pub fn function_declaration(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(DECLARE_PREFIX)?.trim_start();
    let name = rest.strip_prefix("function")?;
    if !name.is_empty() && !name.starts_with(char::is_whitespace) {
        return None;
    }
    Some(name.trim())
}

/// A parsed `declare <type> <name> [= <value>]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableDecl<'a> {
    pub ty: &'a str,
    pub name: &'a str,
    pub init: Option<&'a str>,
}

/// Parse a variable declaration, if `text` has that shape
pub fn variable_declaration(text: &str) -> Option<VariableDecl<'_>> {
    let caps = variable_re().captures(text)?;
    Some(VariableDecl {
        ty: caps.name("ty")?.as_str(),
        name: caps.name("name")?.as_str(),
        init: caps.name("init").map(|m| m.as_str().trim()),
    })
}

/// Statement classes, in match precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Declaration,
    Assembly,
    Conditional,
    Print,
    Unrecognized,
}

/// Classify a trimmed statement
pub fn classify(text: &str) -> LineClass {
    if text.starts_with(DECLARE_PREFIX) {
        return LineClass::Declaration;
    }
    if let Some(caps) = assembly_re().captures(text) {
        // Keywords only lose the assembly form when their own rule claims the statement
        let claimed = match &caps["mnemonic"] {
            "if" => conditional_re().is_match(text),
            PRINT_PREFIX => true,
            _ => false,
        };
        if !claimed {
            return LineClass::Assembly;
        }
    }
    if conditional_re().is_match(text) {
        return LineClass::Conditional;
    }
    if text.starts_with(PRINT_PREFIX) {
        return LineClass::Print;
    }
    LineClass::Unrecognized
}

/// Decode an executable statement.
///
/// Returns `None` for declarations and unrecognized statements; both are the
/// compiler's business. Decoding problems inside a recognized statement are
/// carried as [`StatementKind::Unrecognized`].
pub fn decode(text: &str) -> Option<Statement> {
    decode_at(text, 0)
}

fn decode_at(text: &str, depth: usize) -> Option<Statement> {
    let kind = match classify(text) {
        LineClass::Assembly => decode_assembly(text, depth),
        LineClass::Conditional => decode_conditional(text, depth),
        LineClass::Print => decode_print(text),
        LineClass::Declaration | LineClass::Unrecognized => return None,
    };
    Some(Statement::new(text, kind))
}

/// Decode a statement nested inside `if ... then` or a loop
fn decode_nested(owner: &str, text: &str, depth: usize) -> Result<Statement, Fault> {
    if depth > MAX_NESTING {
        return Err(Fault::malformed(
            owner,
            format!("statements nest deeper than {MAX_NESTING} levels"),
        ));
    }
    match classify(text) {
        LineClass::Declaration => Err(Fault::malformed(
            owner,
            format!("declarations cannot be nested: '{text}'"),
        )),
        LineClass::Unrecognized => Err(Fault::malformed(
            owner,
            format!("unrecognized statement '{text}'"),
        )),
        _ => decode_at(text, depth)
            .ok_or_else(|| Fault::malformed(owner, format!("cannot decode '{text}'"))),
    }
}

fn decode_assembly(text: &str, depth: usize) -> StatementKind {
    let Some(caps) = assembly_re().captures(text) else {
        return StatementKind::Unrecognized(Fault::UnknownCommand(text.to_string()));
    };
    let mnemonic = caps["mnemonic"].to_ascii_lowercase();
    let rest = caps.name("rest").map_or("", |m| m.as_str());

    match decode_op(&mnemonic, rest, depth) {
        Ok(op) => StatementKind::Assembly(op),
        Err(fault) => StatementKind::Unrecognized(fault),
    }
}

fn decode_op(mnemonic: &str, rest: &str, depth: usize) -> Result<Op, Fault> {
    if mnemonic == "loop" {
        return decode_loop(rest, depth).map(Op::Loop);
    }

    let operands = split_operands(rest);
    let malformed = |detail: String| Fault::malformed(mnemonic, detail);

    match mnemonic {
        "mov" => {
            let [dest, src] = expect_operands::<2>(mnemonic, &operands)?;
            Ok(Op::Mov {
                dest: parse_place(dest).map_err(malformed)?,
                src: parse_operand(src).map_err(malformed)?,
            })
        }
        "push" => {
            let [src] = expect_operands::<1>(mnemonic, &operands)?;
            Ok(Op::Push(parse_operand(src).map_err(malformed)?))
        }
        "pop" => {
            let [dest] = expect_operands::<1>(mnemonic, &operands)?;
            Ok(Op::Pop(parse_place(dest).map_err(malformed)?))
        }
        "call" => {
            let [name] = expect_operands::<1>(mnemonic, &operands)?;
            if !function_name_re().is_match(name) {
                return Err(malformed(format!("invalid function name '{name}'")));
            }
            Ok(Op::Call(name.to_string()))
        }
        _ => {
            let Some(op) = ArithOp::from_mnemonic(mnemonic) else {
                return Err(Fault::UnknownCommand(mnemonic.to_string()));
            };
            let [dest, src] = expect_operands::<2>(mnemonic, &operands)?;
            let dest = match parse_place(dest).map_err(malformed)? {
                Place::Register(name) => name,
                Place::Cell(cell) => {
                    return Err(malformed(format!(
                        "destination must be a register, got '{cell}'"
                    )))
                }
            };
            Ok(Op::Arith {
                op,
                dest,
                src: parse_operand(src).map_err(malformed)?,
            })
        }
    }
}

fn decode_loop(rest: &str, depth: usize) -> Result<Loop, Fault> {
    let (kind, tail) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(k, t)| (k, t.trim()));
    let kind = kind.to_ascii_lowercase();
    let owner = format!("loop {kind}");

    match kind.as_str() {
        "for" => {
            let caps = loop_for_re().captures(tail).ok_or_else(|| {
                Fault::malformed(&owner, "expected 'loop for <count> <statement>'")
            })?;
            let count = parse_operand(&caps["count"]).map_err(|d| Fault::malformed(&owner, d))?;
            let body = decode_nested(&owner, caps["body"].trim(), depth + 1)?;
            Ok(Loop::For {
                count,
                body: Box::new(body),
            })
        }
        "while" | "do-while" => {
            let caps = loop_cond_re().captures(tail).ok_or_else(|| {
                Fault::malformed(&owner, format!("expected 'loop {kind} <condition> <statement>'"))
            })?;
            let condition = parse_condition(&caps["cond"]).map_err(|d| Fault::malformed(&owner, d))?;
            let body = Box::new(decode_nested(&owner, caps["body"].trim(), depth + 1)?);
            if kind == "while" {
                Ok(Loop::While { condition, body })
            } else {
                Ok(Loop::DoWhile { condition, body })
            }
        }
        _ => Err(Fault::UnknownLoopKind(kind)),
    }
}

fn decode_conditional(text: &str, depth: usize) -> StatementKind {
    let Some(caps) = conditional_re().captures(text) else {
        return StatementKind::Unrecognized(Fault::malformed("if", "expected 'if <condition> then'"));
    };
    let condition = match parse_condition(caps["cond"].trim()) {
        Ok(condition) => condition,
        Err(detail) => return StatementKind::Unrecognized(Fault::malformed("if", detail)),
    };
    let then = match caps.name("body") {
        Some(body) => match decode_nested("if", body.as_str().trim(), depth + 1) {
            Ok(stmt) => Some(Box::new(stmt)),
            Err(fault) => return StatementKind::Unrecognized(fault),
        },
        None => None,
    };
    StatementKind::Conditional { condition, then }
}

fn decode_print(text: &str) -> StatementKind {
    let rest = text[PRINT_PREFIX.len()..].trim();
    match parse_print_items(rest) {
        Ok(items) => StatementKind::Print(items),
        Err(detail) => StatementKind::Unrecognized(Fault::malformed("print", detail)),
    }
}

fn parse_print_items(mut rest: &str) -> Result<Vec<PrintItem>, String> {
    let mut items = Vec::new();
    loop {
        rest = rest.trim_start().trim_start_matches(',').trim_start();
        if rest.is_empty() {
            return Ok(items);
        }
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted
                .find('"')
                .ok_or_else(|| "unterminated string literal".to_string())?;
            items.push(PrintItem::Text(quoted[..end].to_string()));
            rest = &quoted[end + 1..];
        } else {
            let end = rest
                .find(|c: char| c == ',' || c.is_whitespace())
                .unwrap_or(rest.len());
            items.push(PrintItem::Value(parse_operand(&rest[..end])?));
            rest = &rest[end..];
        }
    }
}

/// Operand tokens are separated by commas and/or whitespace
fn split_operands(rest: &str) -> Vec<&str> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

fn expect_operands<'a, const N: usize>(
    mnemonic: &str,
    operands: &[&'a str],
) -> Result<[&'a str; N], Fault> {
    <[&str; N]>::try_from(operands).map_err(|_| {
        Fault::malformed(
            mnemonic,
            format!("expected {N} operand(s), got {}", operands.len()),
        )
    })
}

/// Parse a source operand token
pub fn parse_operand(token: &str) -> Result<Operand, String> {
    if literal_re().is_match(token) {
        return parse_literal(token).map(Operand::Literal);
    }
    match parse_place(token)? {
        Place::Register(name) => Ok(Operand::Register(name)),
        Place::Cell(cell) => Ok(Operand::Cell(cell)),
    }
}

/// Parse a destination token
pub fn parse_place(token: &str) -> Result<Place, String> {
    if let Some(caps) = array_cell_re().captures(token) {
        let index = &caps["index"];
        let index = if literal_re().is_match(index) {
            Index::Literal(parse_literal(index)?)
        } else if register_re().is_match(index) {
            Index::Register(index.to_string())
        } else {
            return Err(format!("malformed array index '{index}' in '{token}'"));
        };
        return Ok(Place::Cell(Cell {
            container: caps["name"].to_string(),
            address: Address::Index(index),
        }));
    }
    if let Some(caps) = dict_cell_re().captures(token) {
        return Ok(Place::Cell(Cell {
            container: caps["name"].to_string(),
            address: Address::Key(caps["key"].to_string()),
        }));
    }
    if register_re().is_match(token) {
        return Ok(Place::Register(token.to_string()));
    }
    Err(format!("malformed operand '{token}'"))
}

/// Parse `lhs <cmp> rhs` or a bare operand
pub fn parse_condition(text: &str) -> Result<Condition, String> {
    let caps = condition_re()
        .captures(text.trim())
        .ok_or_else(|| format!("malformed condition '{text}'"))?;
    let lhs = parse_operand(&caps["lhs"])?;
    match (caps.name("cmp"), caps.name("rhs")) {
        (Some(cmp), Some(rhs)) => {
            let cmp = Comparison::from_symbol(cmp.as_str())
                .ok_or_else(|| format!("unknown comparison '{}'", cmp.as_str()))?;
            Ok(Condition::compare(lhs, cmp, parse_operand(rhs.as_str())?))
        }
        _ => Ok(Condition::truthy(lhs)),
    }
}

fn parse_literal(token: &str) -> Result<i64, String> {
    token
        .parse::<i64>()
        .map_err(|_| format!("integer literal '{token}' out of range"))
}

/// True when `text` is a valid function name for `declare function`/`call`
pub fn is_function_name(text: &str) -> bool {
    function_name_re().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(text: &str) -> StatementKind {
        decode(text).expect("statement decodes").kind
    }

    #[test]
    fn classification_precedence() {
        assert_eq!(classify("declare int x = 10"), LineClass::Declaration);
        assert_eq!(classify("mov eax"), LineClass::Assembly);
        assert_eq!(classify("mov r1, 5"), LineClass::Assembly);
        assert_eq!(classify("if r1 > 0 then print r1"), LineClass::Conditional);
        assert_eq!(classify("print eax"), LineClass::Print);
        assert_eq!(classify("print"), LineClass::Print);
        assert_eq!(classify("printer paper"), LineClass::Assembly);
        assert_eq!(classify("halt"), LineClass::Unrecognized);
        assert_eq!(classify("42 is the answer"), LineClass::Unrecognized);
    }

    #[test]
    fn two_alphabetic_tokens_are_assembly() {
        for line in ["mov eax", "hello world", "Jump Away", "call helper"] {
            assert_eq!(classify(line), LineClass::Assembly, "{line}");
        }
    }

    #[test]
    fn keywords_outside_their_own_form_are_assembly() {
        for line in ["if x", "Print eax", "Declare x", "IF now", "if then"] {
            assert_eq!(classify(line), LineClass::Assembly, "{line}");
        }
        assert_eq!(classify("if x then"), LineClass::Conditional);
        assert_eq!(classify("print eax"), LineClass::Print);
        assert_eq!(classify("declare x"), LineClass::Declaration);
    }

    #[test]
    fn deep_nesting_is_a_fault() {
        let stmt = decode(&format!("{}print 1", "loop for 1 ".repeat(2000))).unwrap();
        let mut current = &stmt;
        let mut depth = 0;
        while let StatementKind::Assembly(Op::Loop(Loop::For { body, .. })) = &current.kind {
            current = body.as_ref();
            depth += 1;
        }
        assert_eq!(depth, MAX_NESTING);
        assert!(matches!(
            &current.kind,
            StatementKind::Unrecognized(Fault::MalformedOperand { detail, .. }) if detail.contains("nest deeper")
        ));

        let stmt = decode(&format!("{}print 1", "if 1 then ".repeat(3000))).unwrap();
        assert!(matches!(stmt.kind, StatementKind::Conditional { .. }));
    }

    #[test]
    fn decode_mov_register_and_cells() {
        match kind_of("mov r2, r1") {
            StatementKind::Assembly(Op::Mov { dest, src }) => {
                assert_eq!(dest, Place::Register("r2".to_string()));
                assert_eq!(src, Operand::Register("r1".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
        match kind_of("MOV arr[i], 7") {
            StatementKind::Assembly(Op::Mov { dest, src }) => {
                assert_eq!(dest.to_string(), "arr[i]");
                assert_eq!(src, Operand::Literal(7));
            }
            other => panic!("unexpected {other:?}"),
        }
        match kind_of("mov env{home}, -3") {
            StatementKind::Assembly(Op::Mov { dest, src }) => {
                assert_eq!(dest.to_string(), "env{home}");
                assert_eq!(src, Operand::Literal(-3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn arithmetic_rejects_cell_destination() {
        match kind_of("add arr[0], 1") {
            StatementKind::Unrecognized(Fault::MalformedOperand { mnemonic, detail }) => {
                assert_eq!(mnemonic, "add");
                assert!(detail.contains("must be a register"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_operand_count_is_a_fault() {
        assert!(matches!(
            kind_of("mov eax"),
            StatementKind::Unrecognized(Fault::MalformedOperand { .. })
        ));
        assert!(matches!(
            kind_of("hello world"),
            StatementKind::Unrecognized(Fault::UnknownCommand(cmd)) if cmd == "hello"
        ));
    }

    #[test]
    fn decode_loops() {
        match kind_of("loop for 3 add r1, 2") {
            StatementKind::Assembly(Op::Loop(Loop::For { count, body })) => {
                assert_eq!(count, Operand::Literal(3));
                assert_eq!(body.text, "add r1, 2");
            }
            other => panic!("unexpected {other:?}"),
        }
        match kind_of("loop while r1 < 10 add r1, 1") {
            StatementKind::Assembly(Op::Loop(Loop::While { condition, body })) => {
                assert_eq!(condition.to_string(), "r1 < 10");
                assert_eq!(body.text, "add r1, 1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            kind_of("loop do-while r1 call tick"),
            StatementKind::Assembly(Op::Loop(Loop::DoWhile { .. }))
        ));
        assert!(matches!(
            kind_of("loop until r1 add r1, 1"),
            StatementKind::Unrecognized(Fault::UnknownLoopKind(kind)) if kind == "until"
        ));
    }

    #[test]
    fn decode_conditional_forms() {
        match kind_of("if r1 >= 2 then mov r2, 1") {
            StatementKind::Conditional { condition, then } => {
                assert_eq!(condition.to_string(), "r1 >= 2");
                assert_eq!(then.unwrap().text, "mov r2, 1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            kind_of("if flag then"),
            StatementKind::Conditional { then: None, .. }
        ));
        assert!(matches!(
            kind_of("if r1 > 0 then gibberish"),
            StatementKind::Unrecognized(Fault::MalformedOperand { .. })
        ));
    }

    #[test]
    fn decode_print_items() {
        match kind_of(r#"print "total:", acc, arr[1]"#) {
            StatementKind::Print(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], PrintItem::Text("total:".to_string()));
                assert_eq!(items[1], PrintItem::Value(Operand::Register("acc".to_string())));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(kind_of("print"), StatementKind::Print(Vec::new()));
        assert!(matches!(
            kind_of(r#"print "oops"#),
            StatementKind::Unrecognized(_)
        ));
    }

    #[test]
    fn statements_split_on_lines_and_semicolons() {
        let source = "declare int x = 10; mov eax, x; print eax;\n\n  print \"a;b\"  \n";
        let stmts: Vec<(u32, &str)> = statements(source).collect();
        assert_eq!(
            stmts,
            vec![
                (1, "declare int x = 10"),
                (1, "mov eax, x"),
                (1, "print eax"),
                (3, "print \"a;b\""),
            ]
        );
    }

    #[test]
    fn variable_declarations() {
        let decl = variable_declaration("declare int x = 10").unwrap();
        assert_eq!(decl.ty, "int");
        assert_eq!(decl.name, "x");
        assert_eq!(decl.init, Some("10"));
        assert_eq!(variable_declaration("declare flag ready").unwrap().init, None);
        assert!(variable_declaration("declare").is_none());
    }

    #[test]
    fn function_declarations() {
        assert_eq!(function_declaration("declare function tick"), Some("tick"));
        assert_eq!(function_declaration("declare   function  "), Some(""));
        assert_eq!(function_declaration("declare functional x"), None);
        assert_eq!(function_declaration("declare int x"), None);
    }

    #[test]
    fn operand_parsing() {
        assert_eq!(parse_operand("42"), Ok(Operand::Literal(42)));
        assert_eq!(parse_operand("eax"), Ok(Operand::Register("eax".to_string())));
        assert!(parse_operand("5x").is_err());
        assert!(parse_operand("99999999999999999999").is_err());
        assert!(parse_place("arr[1+2]").is_err());
    }
}
