//! End-to-end parser tests, including imports read from disk.

use ddp_syntax::ast::{Expr, Stmt};
use ddp_syntax::{
    DdpParser, DeclKind, ErrorCode, Level, Module, ModuleParser, ParseError, ParseRequest,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn parse_with(
    path: impl Into<PathBuf>,
    src: &str,
    modules: HashMap<PathBuf, Arc<Module>>,
) -> (Module, Vec<ParseError>) {
    let mut errors = Vec::new();
    let request = ParseRequest::new(path, src, modules);
    let module = DdpParser::new()
        .parse(request, &mut |e| errors.push(e))
        .unwrap();
    (module, errors)
}

fn parse(src: &str) -> (Module, Vec<ParseError>) {
    parse_with("/src/main.ddp", src, HashMap::new())
}

fn var_init(module: &Module, index: usize) -> &Expr {
    match &module.statements[index] {
        Stmt::Var(var) => var.init.as_ref().unwrap(),
        other => panic!("expected var, got {other:?}"),
    }
}

const MATH: &str = r#"
[Adds two numbers.]
public func add(a: int, b: int): int alias "add <a> and <b>", "sum of <a> <b>" {
    return a + b;
}
func inc(a: int): int alias "add <a>" { return a + 1; }
"#;

#[test]
fn test_alias_call_binds_arguments() {
    let (module, errors) = parse(&format!("{MATH}var x = add 1 and 2;"));
    assert!(errors.is_empty(), "{errors:?}");
    let Expr::Call(call) = var_init(&module, 2) else {
        panic!("expected call");
    };
    assert_eq!(call.func.name, "add");
    assert_eq!(call.alias, 0);
    let params: Vec<_> = call.args.iter().map(|a| a.param.as_str()).collect();
    assert_eq!(params, ["a", "b"]);
    assert_eq!(call.word_ranges.len(), 2);
}

#[test]
fn test_longest_alias_is_tried_first() {
    let (module, errors) = parse(&format!("{MATH}var x = add 1 and 2;\nvar y = add 5;"));
    assert!(errors.is_empty(), "{errors:?}");
    let Expr::Call(first) = var_init(&module, 2) else {
        panic!("expected call");
    };
    let Expr::Call(second) = var_init(&module, 3) else {
        panic!("expected call");
    };
    assert_eq!(first.func.name, "add");
    assert_eq!(second.func.name, "inc");
}

#[test]
fn test_second_alias_and_binary_after_call() {
    let (module, errors) = parse(&format!("{MATH}var x = sum of 1 2 and true;"));
    assert!(errors.is_empty(), "{errors:?}");
    let Expr::Binary(binary) = var_init(&module, 2) else {
        panic!("expected binary");
    };
    let Expr::Call(call) = binary.lhs.as_ref() else {
        panic!("expected call on the left");
    };
    assert_eq!(call.alias, 1);
}

#[test]
fn test_comment_documents_declaration() {
    let (module, _) = parse(MATH);
    let add = module.public_decls.get("add").unwrap();
    assert_eq!(add.comment.as_deref(), Some("Adds two numbers."));
    assert!(!module.public_decls.contains_key("inc"));
}

#[test]
fn test_undeclared_name_becomes_bad_expression() {
    let (module, errors) = parse("var x = y + 1;\nvar z = 2;");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::UNDECLARED_NAME);
    let Expr::Binary(binary) = var_init(&module, 0) else {
        panic!("expected binary");
    };
    assert!(matches!(binary.lhs.as_ref(), Expr::Bad(_)));
    assert!(matches!(module.statements[1], Stmt::Var(_)));
    assert_eq!(module.errors, errors);
}

#[test]
fn test_syntax_error_recovers_at_next_statement() {
    let (module, errors) = parse("var = 5;\nvar y = 2;\n}\nvar z = y;");
    assert_eq!(module.statements.len(), 4);
    assert!(matches!(module.statements[0], Stmt::Bad(_)));
    assert!(matches!(module.statements[1], Stmt::Var(_)));
    assert!(matches!(module.statements[2], Stmt::Bad(_)));
    assert!(matches!(module.statements[3], Stmt::Var(_)));
    let codes: Vec<_> = errors.iter().map(|e| e.code).collect();
    assert_eq!(codes, [ErrorCode::UNEXPECTED_TOKEN, ErrorCode::EXPECTED_EXPRESSION]);
}

#[test]
fn test_struct_literal_and_fields() {
    let src = "struct Point { x: int, y: int = 0 } alias \"point at <x> <y>\", \"origin\";\n\
               var p = point at 1 2;\nvar o: Point = origin;";
    let (module, errors) = parse(src);
    assert!(errors.is_empty(), "{errors:?}");
    let Stmt::Struct(decl) = &module.statements[0] else {
        panic!("expected struct");
    };
    assert_eq!(decl.fields.len(), 2);
    assert!(matches!(decl.fields[0].decl.kind, DeclKind::Field { .. }));
    assert!(decl.fields[1].init.is_some());
    let Expr::StructLiteral(lit) = var_init(&module, 1) else {
        panic!("expected struct literal");
    };
    assert!(Arc::ptr_eq(&lit.decl, &decl.decl));

    let Stmt::Var(typed) = &module.statements[2] else {
        panic!("expected var");
    };
    let ty = typed.decl.value_type().unwrap();
    assert!(ty.decl.as_ref().is_some_and(|d| Arc::ptr_eq(d, &decl.decl)));
}

#[test]
fn test_generic_call_instantiates_once_per_module() {
    let src = "func id<T>(v: T): T alias \"id of <v>\" { return v; }\n\
               var a = id of 1;\nvar b = id of \"x\";";
    let (module, errors) = parse(src);
    assert!(errors.is_empty(), "{errors:?}");
    let Stmt::Func(template) = &module.statements[0] else {
        panic!("expected func");
    };
    let Expr::Call(first) = var_init(&module, 1) else {
        panic!("expected call");
    };
    let Expr::Call(second) = var_init(&module, 2) else {
        panic!("expected call");
    };
    assert!(!Arc::ptr_eq(&first.func, &template.decl));
    assert!(Arc::ptr_eq(first.func.template().unwrap(), &template.decl));
    assert!(Arc::ptr_eq(&first.func, &second.func));
}

#[test]
fn test_alias_must_mention_every_parameter() {
    let (_, errors) = parse("func f(a: int, b: int) alias \"f <a>\";");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::MALFORMED_ALIAS);
}

#[test]
fn test_duplicate_declaration() {
    let (_, errors) = parse("var x = 1;\nvar x = 2;");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::ALREADY_DECLARED);
    assert_eq!(errors[0].range.start.line, 2);
}

#[test]
fn test_block_scope_is_not_visible_outside() {
    let (_, errors) = parse("if true {\n  var inner = 1;\n}\nvar x = inner;");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::UNDECLARED_NAME);
}

#[test]
fn test_unreachable_code_is_a_warning() {
    let (_, errors) = parse("func f(): int alias \"f\" {\n  return 1;\n  var x = 2;\n}");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, Level::Warning);
    assert_eq!(errors[0].code, ErrorCode::UNREACHABLE_CODE);
    assert_eq!(errors[0].range.start.line, 3);
}

#[test]
fn test_return_outside_function() {
    let (_, errors) = parse("return 1;");
    assert_eq!(errors[0].code, ErrorCode::RETURN_OUTSIDE_FUNCTION);
}

#[test]
fn test_parsing_is_idempotent() {
    let src = "var x = y;\nfunc f(a: int) alias \"f <b>\";\nvar = ;";
    let (first, first_errors) = parse(src);
    let (second, second_errors) = parse(src);
    assert_eq!(first_errors, second_errors);
    assert_eq!(first.errors, second.errors);
    assert_ne!(first.id, second.id);
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_import_all_public_declarations_from_disk() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "math.ddp", MATH);
    let main = dir.path().join("main.ddp");
    let (module, errors) = parse_with(&main, "import \"math\";\nvar x = add 1 and 2;", HashMap::new());
    assert!(errors.is_empty(), "{errors:?}");

    let import = module.imports().next().unwrap();
    assert_eq!(import.resolved_path, dir.path().join("math.ddp"));
    let imported = import.module.as_ref().unwrap();
    let Expr::Call(call) = var_init(&module, 1) else {
        panic!("expected call");
    };
    assert_eq!(call.func.module, imported.id);
    assert_ne!(call.func.module, module.id);
    assert!(module.reaches(&dir.path().join("math.ddp")));
}

#[test]
fn test_import_selected_names() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "math.ddp", MATH);
    let main = dir.path().join("main.ddp");
    let (module, errors) = parse_with(&main, "import add, inc, nope from \"math.ddp\";", HashMap::new());

    let codes: Vec<_> = errors.iter().map(|e| e.code).collect();
    assert_eq!(codes, [ErrorCode::NOT_PUBLIC, ErrorCode::UNDECLARED_NAME]);
    let import = module.imports().next().unwrap();
    assert!(import.symbols[0].decl.is_some());
    assert!(import.symbols[1].decl.is_none());
}

#[test]
fn test_missing_import_is_reported_at_path() {
    let dir = TempDir::new().unwrap();
    let main = dir.path().join("main.ddp");
    let (module, errors) = parse_with(&main, "import \"missing.ddp\";", HashMap::new());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::IMPORT_NOT_FOUND);
    assert_eq!(errors[0].file, main);
    assert!(module.imports().next().unwrap().module.is_none());
}

#[test]
fn test_import_cycle_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.ddp", "import \"b.ddp\";");
    write(dir.path(), "b.ddp", "import \"a.ddp\";");
    let a = dir.path().join("a.ddp");
    let (_, errors) = parse_with(&a, "import \"b.ddp\";", HashMap::new());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::IMPORT_CYCLE);
    assert_eq!(errors[0].file, dir.path().join("b.ddp"));
}

#[test]
fn test_errors_of_imported_files_keep_their_file() {
    let dir = TempDir::new().unwrap();
    let util = write(dir.path(), "util.ddp", "public var broken = missing;");
    let main = dir.path().join("main.ddp");
    let (module, errors) = parse_with(&main, "import \"util.ddp\";\nvar x = broken;", HashMap::new());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file, util);
    assert_eq!(module.errors.len(), 1);
}

#[test]
fn test_context_module_is_reused_and_errors_replayed() {
    let dir = TempDir::new().unwrap();
    let util = dir.path().join("util.ddp");
    // not on disk: only available through the context
    let (util_module, util_errors) =
        parse_with(&util, "public var v = 1;\nvar bad = nope;", HashMap::new());
    assert_eq!(util_errors.len(), 1);
    let util_module = Arc::new(util_module);

    let mut context = HashMap::new();
    context.insert(util.clone(), Arc::clone(&util_module));
    let main = dir.path().join("main.ddp");
    let (module, errors) = parse_with(&main, "import \"util.ddp\";\nvar x = v;", context);

    assert_eq!(errors, util_errors);
    let import = module.imports().next().unwrap();
    assert!(Arc::ptr_eq(import.module.as_ref().unwrap(), &util_module));
}


