mod common;

#[cfg(test)]
mod interpreter_tests {
    use super::common::{run, run_deep, run_ok, runtime_error, session};

    use rox::error::LoxError;
    use rox::interpreter::MAX_CALL_DEPTH;
    use rox::session::{with_large_stack, Failure, EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};

    #[test]
    fn test_arithmetic_and_display() {
        assert_eq!(
            run_ok("print 1 + 2 * 3; print 7 / 2; print -(4 - 6); print 10 - 0.25;"),
            vec!["7", "3.5", "2", "9.75"]
        );
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        assert_eq!(
            run_ok("print 1 / 0; print -1 / 0; print 0 / 0;"),
            vec!["inf", "-inf", "NaN"]
        );
    }

    #[test]
    fn test_nan_equals_itself() {
        assert_eq!(
            run_ok("var n = 0 / 0; print n == n; print (0/0) == (0/0); print n != n;"),
            vec!["true", "true", "false"]
        );
    }

    #[test]
    fn test_equality_never_coerces() {
        assert_eq!(
            run_ok(r#"print 1 == "1"; print nil == false; print nil == nil; print "a" == "a";"#),
            vec!["false", "false", "true", "true"]
        );
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(
            run_ok(r#"print !nil; print !false; print !0; print !""; if (0) print "zero is true";"#),
            vec!["true", "true", "false", "false", "zero is true"]
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_ok(r#"var s = "foo"; print s + "bar";"#), vec!["foobar"]);
    }

    #[test]
    fn test_mixed_plus_is_a_runtime_error() {
        let (error, output) = runtime_error("print \"before\";\nprint \"a\" + 1;\nprint \"after\";");

        assert_eq!(
            error.to_string(),
            "[line 2] Error: Operands of '+' must be two numbers or two strings"
        );
        assert!(matches!(error, LoxError::Runtime { line: 2, .. }));
        // output produced before the error is kept
        assert_eq!(output, "before\n");
    }

    #[test]
    fn test_operand_type_errors() {
        let (error, _) = runtime_error("print -\"x\";");
        assert_eq!(error.to_string(), "[line 1] Error: Operand of '-' must be a number");

        let (error, _) = runtime_error("print 1 < \"2\";");
        assert_eq!(error.to_string(), "[line 1] Error: Operands of '<' must be numbers");
    }

    #[test]
    fn test_undefined_variable() {
        let (error, _) = runtime_error("print nope;");
        assert_eq!(error.to_string(), "[line 1] Error: Undefined variable 'nope'");

        let (error, _) = runtime_error("nope = 1;");
        assert_eq!(error.to_string(), "[line 1] Error: Undefined variable 'nope'");
    }

    #[test]
    fn test_block_scoping_and_shadowing() {
        let source = r#"
    var a = "global a";
    var b = "global b";
    {
      var a = "outer a";
      {
        var a = "inner a";
        print a;
        print b;
      }
      print a;
    }
    print a;
    "#;

        assert_eq!(
            run_ok(source),
            vec!["inner a", "global b", "outer a", "global a"]
        );
    }

    #[test]
    fn test_uninitialized_variable_is_nil() {
        assert_eq!(run_ok("var x; print x;"), vec!["nil"]);
    }

    #[test]
    fn test_logical_operators_return_an_operand() {
        assert_eq!(
            run_ok(r#"print "hi" or 2; print nil or "yes"; print nil and boom; print 1 and 2;"#),
            vec!["hi", "yes", "nil", "2"]
        );
    }

    #[test]
    fn test_short_circuit_skips_side_effects() {
        let source = r#"
    var calls = 0;
    fun touch() { calls = calls + 1; return true; }
    true or touch();
    false and touch();
    print calls;
    "#;

        assert_eq!(run_ok(source), vec!["0"]);
    }

    #[test]
    fn test_while_and_for_loops() {
        assert_eq!(
            run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            vec!["0", "1", "2"]
        );
        assert_eq!(
            run_ok("for (var i = 0; i < 10; i = i + 4) print i;"),
            vec!["0", "4", "8"]
        );
    }

    #[test]
    fn test_recursion() {
        let source = r#"
    fun fib(n) {
      if (n < 2) return n;
      return fib(n - 2) + fib(n - 1);
    }
    print fib(15);
    "#;

        assert_eq!(run_ok(source), vec!["610"]);
    }

    #[test]
    fn test_return_unwinds_out_of_loops() {
        let source = r#"
    fun first_over(limit) {
      for (var i = 0; ; i = i + 1) {
        while (true) {
          if (i > limit) return i;
          i = i + 1;
        }
      }
    }
    print first_over(3);
    "#;

        assert_eq!(run_ok(source), vec!["4"]);
    }

    #[test]
    fn test_closures_capture_their_environment() {
        let source = r#"
    fun makeCounter() {
      var i = 0;
      fun count() {
        i = i + 1;
        print i;
      }
      return count;
    }
    var c = makeCounter();
    c();
    c();
    var d = makeCounter();
    d();
    c();
    "#;

        assert_eq!(run_ok(source), vec!["1", "2", "1", "3"]);
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run_ok("fun f() {} print f();"), vec!["nil"]);
    }

    #[test]
    fn test_arity_mismatch_does_not_run_the_body() {
        let (error, output) = runtime_error("fun f(a, b) { print \"ran\"; }\nf(1);");

        assert_eq!(error.to_string(), "[line 2] Error: Expected 2 arguments but got 1");
        assert_eq!(output, "");

        let (error, output) = runtime_error("fun f(a, b) { print \"ran\"; }\nf(1, 2, 3);");

        assert_eq!(error.to_string(), "[line 2] Error: Expected 2 arguments but got 3");
        assert_eq!(output, "");

        let (error, _) = runtime_error("clock(1);");
        assert_eq!(error.to_string(), "[line 1] Error: Expected 0 arguments but got 1");
    }

    #[test]
    fn test_calling_a_non_callable() {
        let (error, _) = runtime_error("var x = \"str\";\nx();");
        assert_eq!(error.to_string(), "[line 2] Error: Can only call functions and classes");
    }

    #[test]
    fn test_clock_returns_seconds() {
        assert_eq!(run_ok("print clock() > 1000000000;"), vec!["true"]);
        assert_eq!(run_ok("var t = clock(); print clock() >= t;"), vec!["true"]);
    }

    #[test]
    fn test_callable_display_forms() {
        let source = r#"
    fun hello() {}
    class Point { sum() {} }
    var p = Point();
    print hello;
    print clock;
    print Point;
    print p;
    print p.sum;
    "#;

        assert_eq!(
            run_ok(source),
            vec!["<fn hello>", "<native fn>", "Point", "Point instance", "<fn sum>"]
        );
    }

    #[test]
    fn test_fields_and_methods() {
        let source = r#"
    class Box {
      describe() { return "box of " + this.item; }
    }
    var b = Box();
    b.item = "socks";
    print b.item;
    print b.describe();
    var m = b.describe;
    b.item = "shoes";
    print m();
    "#;

        assert_eq!(run_ok(source), vec!["socks", "box of socks", "box of shoes"]);
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = r#"
    class A { m() { return "method"; } }
    var a = A();
    a.m = "field";
    print a.m;
    "#;

        assert_eq!(run_ok(source), vec!["field"]);
    }

    #[test]
    fn test_property_errors() {
        let (error, _) = runtime_error("class A {}\nprint A().missing;");
        assert_eq!(error.to_string(), "[line 2] Error: Undefined property 'missing'");

        let (error, _) = runtime_error("var n = 1;\nprint n.x;");
        assert_eq!(error.to_string(), "[line 2] Error: Only instances have properties");

        let (error, _) = runtime_error("var n = 1;\nn.x = 2;");
        assert_eq!(error.to_string(), "[line 2] Error: Only instances have fields");
    }

    #[test]
    fn test_initializer_runs_and_returns_the_instance() {
        let source = r#"
    class Pair {
      init(a, b) {
        this.a = a;
        this.b = b;
      }
    }
    var p = Pair(1, 2);
    print p.a + p.b;
    print p.init(3, 4) == p;
    print p.a;
    "#;

        assert_eq!(run_ok(source), vec!["3", "true", "3"]);
    }

    #[test]
    fn test_early_return_in_initializer_still_yields_instance() {
        let source = r#"
    class A {
      init() {
        this.x = 1;
        return;
        this.x = 2;
      }
    }
    print A().x;
    "#;

        assert_eq!(run_ok(source), vec!["1"]);
    }

    #[test]
    fn test_class_arity_comes_from_init() {
        let (error, _) = runtime_error("class A { init(x) {} }\nA();");
        assert_eq!(error.to_string(), "[line 2] Error: Expected 1 arguments but got 0");

        let (error, _) = runtime_error("class B {}\nB(1);");
        assert_eq!(error.to_string(), "[line 2] Error: Expected 0 arguments but got 1");
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = r#"
    class A {
      method() { print "A method"; }
      who() { return "A sees " + this.name; }
    }
    class B < A {
      method() {
        print "B method";
        super.method();
      }
      who() { return super.who(); }
    }
    var b = B();
    b.name = "b";
    b.method();
    print b.who();
    "#;

        assert_eq!(run_ok(source), vec!["B method", "A method", "A sees b"]);
    }

    #[test]
    fn test_super_skips_the_current_class() {
        let source = r#"
    class A { say() { print "A"; } }
    class B < A { say() { print "B"; } test() { super.say(); } }
    class C < B {}
    C().test();
    "#;

        assert_eq!(run_ok(source), vec!["A"]);
    }

    #[test]
    fn test_inherited_initializer() {
        let source = r#"
    class A { init(v) { this.v = v; } }
    class B < A {}
    print B(5).v;
    "#;

        assert_eq!(run_ok(source), vec!["5"]);
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let (error, _) = runtime_error("var NotClass = 1;\nclass B < NotClass {}");
        assert_eq!(error.to_string(), "[line 2] Error: Superclass must be a class");
    }

    #[test]
    fn test_undefined_super_method() {
        let (error, _) = runtime_error("class A {}\nclass B < A { m() { super.nope(); } }\nB().m();");
        assert_eq!(error.to_string(), "[line 2] Error: Undefined property 'nope'");
    }

    #[test]
    fn test_functions_and_instances_compare_by_identity() {
        let source = r#"
    fun f() {}
    var g = f;
    class A {}
    var a = A();
    print f == g;
    print A() == A();
    print a == a;
    "#;

        assert_eq!(run_ok(source), vec!["true", "false", "true"]);
    }

    #[test]
    fn test_session_keeps_state_across_runs() {
        let (mut session, buffer) = session();

        session.run("var count = 0;").expect("first run");
        session
            .run("fun bump() { count = count + 1; return count; }")
            .expect("second run");
        session.run("bump(); bump();").expect("third run");
        session.run("print bump();").expect("fourth run");

        assert_eq!(buffer.contents(), "3\n");
    }

    #[test]
    fn test_session_closures_survive_later_runs() {
        let (mut session, buffer) = session();

        session
            .run("fun make() { var n = 10; fun get() { return n; } return get; } var g = make();")
            .expect("define");
        // later lines allocate fresh expression ids; the closure must still resolve
        session.run("{ var n = 99; print g(); }").expect("call");

        assert_eq!(buffer.contents(), "10\n");
    }

    #[test]
    fn test_session_recovers_after_errors() {
        let (mut session, buffer) = session();

        assert!(matches!(session.run("print ;"), Err(Failure::Static(_))));
        assert!(matches!(session.run("print undefined;"), Err(Failure::Runtime(_))));
        session.run("print \"still alive\";").expect("recovered");

        assert_eq!(buffer.contents(), "still alive\n");
    }

    #[test]
    fn test_exit_codes() {
        let (_, outcome) = run("print (;");
        assert_eq!(outcome.map_err(|f| f.exit_code()), Err(EXIT_STATIC_ERROR));

        let (_, outcome) = run("print -nil;");
        assert_eq!(outcome.map_err(|f| f.exit_code()), Err(EXIT_RUNTIME_ERROR));

        let (_, outcome) = run("print 1;");
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_lexical_errors_block_execution() {
        let (output, outcome) = run("print 1;\nprint @;");

        match outcome {
            Err(Failure::Static(diagnostics)) => {
                let messages: Vec<String> = diagnostics.iter().map(|e| e.to_string()).collect();
                assert_eq!(messages[0], "[line 2] Error: Unexpected character: @");
            }
            other => panic!("expected static failure, got {:?}", other.map(|_| ())),
        }
        assert_eq!(output, "");
    }

    #[test]
    fn test_unbounded_recursion_is_a_runtime_error() {
        let (output, outcome) = run_deep("fun f() { f(); }\nf();\nprint \"unreachable\";");

        match outcome {
            Err(Failure::Runtime(error)) => {
                // the call that crosses the limit is the one inside `f`
                assert_eq!(error.to_string(), "[line 1] Error: Stack overflow");
            }
            other => panic!("expected a runtime error, got {:?}", other),
        }
        assert_eq!(output, "");
    }

    #[test]
    fn test_deep_recursion_below_the_limit_completes() {
        let depth = MAX_CALL_DEPTH - 10;
        let source = format!(
            "fun sum(n) {{ if (n == 0) return 0; return n + sum(n - 1); }}\nprint sum({});",
            depth
        );

        let (output, outcome) = run_deep(&source);

        assert!(outcome.is_ok(), "{:?}", outcome);
        assert_eq!(output, format!("{}\n", depth * (depth + 1) / 2));
    }

    #[test]
    fn test_call_depth_resets_after_overflow() {
        let output = with_large_stack(|| {
            let (mut session, buffer) = session();

            let overflow = session.run("fun f() { f(); } f();");
            assert!(matches!(overflow, Err(Failure::Runtime(_))));

            session
                .run("fun down(n) { if (n == 0) return \"done\"; return down(n - 1); }")
                .expect("define");
            session.run("print down(900);").expect("full depth available again");

            buffer.contents()
        })
        .expect("session thread");

        assert_eq!(output, "done\n");
    }
}
