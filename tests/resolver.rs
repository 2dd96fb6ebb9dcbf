#[cfg(test)]
mod resolver_tests {
    use rox as lox;

    use lox::ast::Stmt;
    use lox::parser::Parser;
    use lox::resolver::{self, Resolution};
    use lox::session::scan;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, errors) = scan(source);
        assert!(errors.is_empty(), "lex errors: {:?}", errors);

        Parser::new(tokens).parse().expect("program should parse")
    }

    fn errors_of(resolution: &Resolution) -> Vec<String> {
        resolution.errors.iter().map(|e| e.to_string()).collect()
    }

    fn assert_single_error(source: &str, expected: &str) {
        let statements = parse(source);
        let resolution = resolver::resolve(&statements);
        let errors = errors_of(&resolution);

        assert_eq!(errors.len(), 1, "got {:?}", errors);
        assert!(
            errors[0].contains(expected),
            "expected {:?} in {:?}",
            expected,
            errors[0]
        );
    }

    fn sorted_distances(resolution: &Resolution) -> Vec<usize> {
        let mut distances: Vec<usize> = resolution.table.iter().map(|(_, d)| d).collect();
        distances.sort_unstable();
        distances
    }

    #[test]
    fn test_globals_are_left_out_of_the_table() {
        let statements = parse("var a = 1; print a; a = 2;");
        let resolution = resolver::resolve(&statements);

        assert!(resolution.is_ok());
        assert!(resolution.table.is_empty());
    }

    #[test]
    fn test_nested_block_distance() {
        let statements = parse("{ var a = 1; { { print a; } } }");
        let resolution = resolver::resolve(&statements);

        assert!(resolution.is_ok(), "{:?}", errors_of(&resolution));
        assert_eq!(sorted_distances(&resolution), vec![2]);
    }

    #[test]
    fn test_closure_captures_enclosing_function_scope() {
        let statements = parse(
            "fun make() {
               var n = 0;
               fun inc() { n = n + 1; return n; }
               return inc;
             }
             print make();",
        );
        let resolution = resolver::resolve(&statements);

        assert!(resolution.is_ok(), "{:?}", errors_of(&resolution));
        assert_eq!(sorted_distances(&resolution), vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_this_and_super_distances() {
        let statements = parse(
            "class A { m() { return 1; } }
             class B < A { m() { return super.m() + this.n; } }
             print B;",
        );
        let resolution = resolver::resolve(&statements);

        assert!(resolution.is_ok(), "{:?}", errors_of(&resolution));
        // `this` one hop out of the method body, `super` two.
        assert_eq!(sorted_distances(&resolution), vec![1, 2]);
    }

    #[test]
    fn test_resolving_twice_yields_identical_table() {
        let statements = parse("fun f(x) { { var y = x; print y; } return x; } print f(1);");

        let first = resolver::resolve(&statements);
        let second = resolver::resolve(&statements);

        assert!(first.is_ok());
        assert_eq!(first.table, second.table);
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_single_error(
            "var a = 1; { var a = a + 1; print a; }",
            "Can't read local variable in its own initializer.",
        );
    }

    #[test]
    fn test_duplicate_local_declaration() {
        assert_single_error(
            "{ var a = 1; var a = 2; print a; }",
            "A variable with the same name already exists in this scope.",
        );
    }

    #[test]
    fn test_duplicate_global_is_allowed() {
        let statements = parse("var a = 1; var a = 2; print a;");

        assert!(resolver::resolve(&statements).is_ok());
    }

    #[test]
    fn test_break_outside_loop() {
        assert_single_error("break;", "'break' must be inside a loop.");
    }

    #[test]
    fn test_break_in_function_inside_loop() {
        assert_single_error(
            "while (true) { fun f() { break; } f(); }",
            "'break' must be inside a loop.",
        );
    }

    #[test]
    fn test_break_inside_loop_is_accepted() {
        let statements = parse("while (true) { if (true) break; }");

        assert!(resolver::resolve(&statements).is_ok());
    }

    #[test]
    fn test_return_at_top_level() {
        assert_single_error("return 1;", "Can't return from top-level code.");
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_single_error(
            "class A { init() { return 1; } }",
            "Can't return a value from an initializer.",
        );
    }

    #[test]
    fn test_bare_return_from_initializer_is_accepted() {
        let statements = parse("class A { init() { return; } }");

        assert!(resolver::resolve(&statements).is_ok());
    }

    #[test]
    fn test_this_outside_class() {
        assert_single_error("print this;", "Can't use 'this' outside of a class.");
    }

    #[test]
    fn test_super_outside_class() {
        assert_single_error("print super.m;", "Can't use 'super' outside of a class.");
    }

    #[test]
    fn test_super_without_superclass() {
        assert_single_error(
            "class A { m() { return super.m; } }",
            "Can't use 'super' in a class with no superclass.",
        );
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        assert_single_error("class A < A {}", "A class can't inherit from itself.");
    }

    #[test]
    fn test_unused_local_is_reported() {
        assert_single_error("{ var lonely = 1; }", "Local variable 'lonely' is never used.");
    }

    #[test]
    fn test_unused_parameter_is_reported() {
        assert_single_error(
            "fun f(ignored) { return 1; } print f(2);",
            "Local variable 'ignored' is never used.",
        );
    }

    #[test]
    fn test_underscore_prefix_silences_unused_check() {
        let statements = parse("{ var _scratch = 1; } fun f(_x) { return 1; } print f(2);");

        assert!(resolver::resolve(&statements).is_ok());
    }

    #[test]
    fn test_errors_are_collected_in_one_pass() {
        let statements = parse("break;\nreturn 1;\nprint this;");
        let resolution = resolver::resolve(&statements);
        let errors = errors_of(&resolution);

        assert_eq!(errors.len(), 3, "got {:?}", errors);
        assert!(errors[0].starts_with("[line 1]"));
        assert!(errors[1].starts_with("[line 2]"));
        assert!(errors[2].starts_with("[line 3]"));
    }
}
