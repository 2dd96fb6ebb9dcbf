#[cfg(test)]
mod interpreter_tests {
    use rox as lox;

    use lox::interpreter::Interpreter;
    use lox::session::{Outcome, Session};
    use lox::sink::{CapturedOutput, CollectedDiagnostics};
    use lox::value::Value;

    fn session() -> (Session<CollectedDiagnostics>, CapturedOutput) {
        let out = CapturedOutput::new();
        let interpreter = Interpreter::with_output(Box::new(out.clone()));

        (Session::new(interpreter, CollectedDiagnostics::new()), out)
    }

    /// Runs `source` in a fresh session and returns its printed lines.
    fn run_ok(source: &str) -> Vec<String> {
        let (mut session, out) = session();
        let outcome = session.run(source);

        assert_eq!(
            outcome,
            Outcome::Success,
            "diagnostics: {:?}",
            session.diagnostics()
        );

        out.lines()
    }

    /// Runs `source` expecting a runtime error; returns output and the message.
    fn run_failing(source: &str) -> (Vec<String>, usize, String) {
        let (mut session, out) = session();
        let outcome = session.run(source);

        assert_eq!(outcome, Outcome::RuntimeError);

        let errors = &session.diagnostics().runtime_errors;
        assert_eq!(errors.len(), 1, "got {:?}", errors);

        (out.lines(), errors[0].line, errors[0].message.clone())
    }

    #[test]
    fn test_counter_closure_keeps_its_own_state() {
        let lines = run_ok(
            "fun makeCounter() {
               var i = 0;
               fun count() { i = i + 1; print i; }
               return count;
             }
             var counter = makeCounter();
             counter();
             counter();",
        );

        assert_eq!(lines, vec!["1", "2"]);
    }

    #[test]
    fn test_counters_do_not_share_state() {
        let lines = run_ok(
            "fun makeCounter() {
               var i = 0;
               fun count() { i = i + 1; print i; }
               return count;
             }
             var a = makeCounter();
             var b = makeCounter();
             a();
             a();
             b();",
        );

        assert_eq!(lines, vec!["1", "2", "1"]);
    }

    #[test]
    fn test_closure_sees_binding_from_declaration_time() {
        let lines = run_ok(
            "var a = \"global\";
             {
               fun show() { print a; }
               show();
               var a = \"block\";
               show();
               print a;
             }",
        );

        assert_eq!(lines, vec!["global", "global", "block"]);
    }

    #[test]
    fn test_assignment_in_inner_scope_updates_outer_binding() {
        let lines = run_ok(
            "var g = \"global\";
             { g = \"changed\"; }
             print g;
             {
               var local = 1;
               { local = 2; }
               print local;
             }",
        );

        assert_eq!(lines, vec!["changed", "2"]);
    }

    #[test]
    fn test_recursion() {
        let lines = run_ok(
            "fun fib(n) {
               if (n < 2) return n;
               return fib(n - 1) + fib(n - 2);
             }
             print fib(10);",
        );

        assert_eq!(lines, vec!["55"]);
    }

    #[test]
    fn test_deep_recursion_completes() {
        let lines = run_ok(
            "fun depth(n) {
               if (n == 0) return 0;
               return 1 + depth(n - 1);
             }
             print depth(1000);",
        );

        assert_eq!(lines, vec!["1000"]);
    }

    #[test]
    fn test_unbounded_recursion_is_a_runtime_error() {
        let (lines, line, message) = run_failing(
            "print \"start\";
             fun f() { f(); }
             f();",
        );

        assert_eq!(lines, vec!["start"]);
        assert_eq!(line, 2);
        assert_eq!(message, "Stack overflow.");
    }

    #[test]
    fn test_session_recovers_after_stack_overflow() {
        let (mut session, out) = session();

        assert_eq!(session.run("fun f() { f(); } f();"), Outcome::RuntimeError);
        assert_eq!(
            session.run("fun g(n) { if (n > 0) g(n - 1); } g(100); print \"ok\";"),
            Outcome::Success
        );

        assert_eq!(out.lines(), vec!["ok"]);
    }

    #[test]
    fn test_return_from_nested_loops() {
        let lines = run_ok(
            "fun f() {
               while (true) {
                 for (var i = 0; i < 5; i = i + 1) {
                   if (i == 2) return i;
                 }
               }
             }
             print f();
             print \"after\";",
        );

        assert_eq!(lines, vec!["2", "after"]);
    }

    #[test]
    fn test_loop_scopes_are_reclaimed() {
        let (mut session, out) = session();

        let outcome = session.run(
            "var n = 0;
             for (var i = 0; i < 100000; i = i + 1) { n = n + 1; }
             print n;",
        );

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(out.lines(), vec!["100000"]);
        assert_eq!(session.interpreter().environments().len(), 1);
    }

    #[test]
    fn test_call_frames_are_reclaimed() {
        let (mut session, out) = session();

        let outcome = session.run(
            "fun add(a, b) { var sum = a + b; return sum; }
             var total = 0;
             for (var i = 0; i < 1000; i = i + 1) { total = add(total, i); }
             print total;",
        );

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(out.lines(), vec!["499500"]);
        assert_eq!(session.interpreter().environments().len(), 1);
    }

    #[test]
    fn test_only_escaping_instances_are_kept() {
        let (mut session, out) = session();

        let outcome = session.run(
            "class P {}
             var keep;
             for (var i = 0; i < 100; i = i + 1) {
               var p = P();
               p.n = i;
               if (i == 50) keep = p;
             }
             print keep.n;",
        );

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(out.lines(), vec!["50"]);
        assert_eq!(session.interpreter().instances().len(), 1);
    }

    #[test]
    fn test_closure_stored_from_loop_keeps_its_scope() {
        let lines = run_ok(
            "var saved;
             for (var i = 0; i < 3; i = i + 1) {
               fun show() { print i; }
               if (i == 1) saved = show;
             }
             saved();",
        );

        assert_eq!(lines, vec!["3"]);
    }

    #[test]
    fn test_returned_closure_and_field_survive_their_scopes() {
        let lines = run_ok(
            "class Box {}
             var box = Box();
             fun fill() {
               var label = \"inner\";
               fun read() { return label; }
               box.read = read;
             }
             fill();
             {
               var x = \"block\";
               fun get() { return x; }
               box.get = get;
             }
             var filler = \"reuse\";
             print box.read();
             print box.get();
             print filler;",
        );

        assert_eq!(lines, vec!["inner", "block", "reuse"]);
    }

    #[test]
    fn test_super_call_concatenates() {
        let lines = run_ok(
            "class A { method() { return \"base\"; } }
             class B < A { method() { return super.method() + \"-sub\"; } }
             print B().method();",
        );

        assert_eq!(lines, vec!["base-sub"]);
    }

    #[test]
    fn test_super_is_fixed_by_declaring_class() {
        let lines = run_ok(
            "class A { say() { print \"A\"; } }
             class B < A {
               test() { super.say(); }
               say() { print \"B\"; }
             }
             class C < B { say() { print \"C\"; } }
             C().test();",
        );

        assert_eq!(lines, vec!["A"]);
    }

    #[test]
    fn test_inherited_methods_are_found_on_subclass() {
        let lines = run_ok(
            "class A { hello() { return \"hello from A\"; } }
             class B < A {}
             print B().hello();",
        );

        assert_eq!(lines, vec!["hello from A"]);
    }

    #[test]
    fn test_extracted_method_keeps_this() {
        let lines = run_ok(
            "class Person {
               init(name) { this.name = name; }
               greet() { print \"hi \" + this.name; }
             }
             var greet = Person(\"ada\").greet;
             greet();",
        );

        assert_eq!(lines, vec!["hi ada"]);
    }

    #[test]
    fn test_initializer_returns_the_instance() {
        let lines = run_ok(
            "class P {
               init() { this.x = 1; return; }
             }
             var p = P();
             print p.init() == p;
             print p.x;",
        );

        assert_eq!(lines, vec!["true", "1"]);
    }

    #[test]
    fn test_fields_shadow_methods() {
        let lines = run_ok(
            "class A { m() { return \"method\"; } }
             var a = A();
             print a.m();
             a.m = \"field\";
             print a.m;",
        );

        assert_eq!(lines, vec!["method", "field"]);
    }

    #[test]
    fn test_instances_do_not_share_fields() {
        let lines = run_ok(
            "class Box {}
             var one = Box();
             var two = Box();
             one.v = 1;
             two.v = 2;
             print one.v;
             print two.v;",
        );

        assert_eq!(lines, vec!["1", "2"]);
    }

    #[test]
    fn test_for_loop_break_exits_early() {
        let lines = run_ok("for (var i = 0; i < 3; i = i + 1) { print i; break; }");

        assert_eq!(lines, vec!["0"]);
    }

    #[test]
    fn test_conditional_break_in_for_body() {
        let lines = run_ok("for (var i = 0; i < 3; i = i + 1) { if (i == 1) break; print i; }");

        assert_eq!(lines, vec!["0"]);
    }

    #[test]
    fn test_break_leaves_only_innermost_loop() {
        let lines = run_ok(
            "var i = 0;
             while (i < 2) {
               while (true) { break; }
               print i;
               i = i + 1;
             }",
        );

        assert_eq!(lines, vec!["0", "1"]);
    }

    #[test]
    fn test_logical_operators_return_an_operand() {
        let lines = run_ok(
            "print nil or \"default\";
             print 0 and \"second\";
             print false and 1;
             print \"first\" or 2;",
        );

        assert_eq!(lines, vec!["default", "second", "false", "first"]);
    }

    #[test]
    fn test_arithmetic_and_number_printing() {
        let lines = run_ok(
            "print 7;
             print 3 / 2;
             print -(2 * 4) + 1;
             print 1.0;
             print 4000 * 5000;
             print 1 / 8000;",
        );

        assert_eq!(lines, vec!["7", "1.5", "-7", "1", "2.0E7", "1.25E-4"]);
    }

    #[test]
    fn test_string_concatenation_with_numbers() {
        let lines = run_ok(
            "print \"n=\" + 3;
             print 2.5 + \"x\";
             print \"a\" + \"b\";",
        );

        assert_eq!(lines, vec!["n=3", "2.5x", "ab"]);
    }

    #[test]
    fn test_equality() {
        let lines = run_ok(
            "print \"a\" == \"a\";
             print nil == false;
             print 1 != 2;
             print nil == nil;",
        );

        assert_eq!(lines, vec!["true", "false", "true", "true"]);
    }

    #[test]
    fn test_callable_values_print_their_names() {
        let lines = run_ok(
            "fun f() {}
             class K {}
             print f;
             print K;
             print K();
             print clock;",
        );

        assert_eq!(lines, vec!["<fn f>", "K", "K instance", "<native fn clock>"]);
    }

    #[test]
    fn test_clock_returns_positive_seconds() {
        let lines = run_ok("print clock() > 0;");

        assert_eq!(lines, vec!["true"]);
    }

    #[test]
    fn test_division_by_zero_aborts_the_run() {
        let (lines, line, message) = run_failing("print 1;\nprint 10 / 0;\nprint 2;");

        assert_eq!(lines, vec!["1"]);
        assert_eq!(line, 2);
        assert_eq!(message, "Division by zero.");
    }

    #[test]
    fn test_unary_minus_on_string() {
        let (_, _, message) = run_failing("print -\"a\";");

        assert_eq!(message, "Operand must be a number.");
    }

    #[test]
    fn test_comparison_on_mixed_types() {
        let (_, _, message) = run_failing("print 1 < \"2\";");

        assert_eq!(message, "Operands must be numbers.");
    }

    #[test]
    fn test_adding_nil_is_a_type_error() {
        let (_, _, message) = run_failing("print nil + 1;");

        assert!(message.starts_with("Operands must be"), "got {:?}", message);
    }

    #[test]
    fn test_undefined_variable() {
        let (_, line, message) = run_failing("\nprint missing;");

        assert_eq!(line, 2);
        assert_eq!(message, "Undefined variable 'missing'.");
    }

    #[test]
    fn test_assigning_undefined_global() {
        let (_, _, message) = run_failing("missing = 1;");

        assert_eq!(message, "Undefined variable 'missing'.");
    }

    #[test]
    fn test_wrong_number_of_arguments() {
        let (_, _, message) = run_failing("fun f(a, b) { return a + b; } f(1);");

        assert_eq!(message, "Expected 2 arguments but got 1.");
    }

    #[test]
    fn test_class_without_init_takes_no_arguments() {
        let (_, _, message) = run_failing("class K {} K(1);");

        assert_eq!(message, "Expected 0 arguments but got 1.");
    }

    #[test]
    fn test_calling_a_non_callable() {
        let (_, _, message) = run_failing("\"text\"();");

        assert_eq!(message, "Can only call functions and classes.");
    }

    #[test]
    fn test_property_access_on_non_instance() {
        let (_, _, message) = run_failing("var x = 1; print x.field;");
        assert_eq!(message, "Only instances have properties.");

        let (_, _, message) = run_failing("var y = 1; y.field = 2;");
        assert_eq!(message, "Only instances have fields.");
    }

    #[test]
    fn test_undefined_property() {
        let (_, _, message) = run_failing("class K {} print K().nope;");

        assert_eq!(message, "Undefined property 'nope'.");
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let (_, _, message) = run_failing("var NotClass = 1; class A < NotClass {}");

        assert_eq!(message, "Superclass must be a class.");
    }

    #[test]
    fn test_compile_error_prevents_execution() {
        let (mut session, out) = session();

        let outcome = session.run("print 1; var a = 1; { var a = a + 1; print a; }");

        assert_eq!(outcome, Outcome::CompileError);
        assert!(out.lines().is_empty());
        assert_eq!(session.diagnostics().compile_errors.len(), 1);
        assert!(session.diagnostics().runtime_errors.is_empty());
    }

    #[test]
    fn test_every_syntax_error_is_reported() {
        let (mut session, _) = session();

        let outcome = session.run("var = 1;\nprint (;\n");

        assert_eq!(outcome, Outcome::CompileError);
        assert_eq!(session.diagnostics().compile_errors.len(), 2);
        assert_eq!(session.diagnostics().compile_errors[1].line, 2);
    }

    #[test]
    fn test_globals_persist_across_runs() {
        let (mut session, out) = session();

        assert_eq!(session.run("var greeting = \"hello\";"), Outcome::Success);
        assert_eq!(session.run("fun echo(x) { return x; }"), Outcome::Success);
        assert_eq!(
            session.run("{ var local = greeting; print echo(local); }"),
            Outcome::Success
        );

        assert_eq!(out.lines(), vec!["hello"]);
        assert_eq!(
            session.interpreter().global("greeting"),
            Some(Value::String("hello".to_string()))
        );
    }

    #[test]
    fn test_session_recovers_after_runtime_error() {
        let (mut session, out) = session();

        assert_eq!(session.run("var n = 1; print n / 0;"), Outcome::RuntimeError);
        assert_eq!(session.run("print n + 1;"), Outcome::Success);

        assert_eq!(out.lines(), vec!["2"]);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::CompileError.exit_code(), 65);
        assert_eq!(Outcome::RuntimeError.exit_code(), 70);
    }
}
