mod common;

#[cfg(test)]
mod parser_tests {
    use super::common::scan;

    use rox::ast::{Expr, Stmt};
    use rox::ast_printer::AstPrinter;
    use rox::diagnostics::Diagnostics;
    use rox::parser::{Parser, MAX_NESTING};
    use rox::session::with_large_stack;

    /// Parse `source` and return (printed statements, rendered errors).
    fn parse(source: &str) -> (Vec<String>, Vec<String>) {
        let (tokens, mut diagnostics) = scan(source);
        let statements = Parser::new(&tokens, &mut diagnostics).parse();

        let printed = statements.iter().map(AstPrinter::print_stmt).collect();
        let errors = diagnostics.iter().map(|e| e.to_string()).collect();
        (printed, errors)
    }

    fn parse_clean(source: &str) -> Vec<String> {
        let (printed, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        printed
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(
            parse_clean("1 + 2 * 3 - 4 / 5;"),
            vec!["(; (- (+ 1.0 (* 2.0 3.0)) (/ 4.0 5.0)))"]
        );
        assert_eq!(
            parse_clean("!true == false or nil and 1 < 2;"),
            vec!["(; (or (== (! true) false) (and nil (< 1.0 2.0))))"]
        );
        assert_eq!(parse_clean("-(1.5);"), vec!["(; (- (group 1.5)))"]);
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(parse_clean("a = b = 3;"), vec!["(; (= a (= b 3.0)))"]);
        assert_eq!(
            parse_clean("obj.field.inner = 1;"),
            vec!["(; (= (. (. obj field) inner) 1.0))"]
        );
    }

    #[test]
    fn test_calls_and_property_chains() {
        assert_eq!(
            parse_clean("f(1)(2, \"x\").g();"),
            vec!["(; (call (. (call (call f 1.0) 2.0 x) g)))"]
        );
    }

    #[test]
    fn test_for_loop_desugars_to_while() {
        assert_eq!(
            parse_clean("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"]
        );

        // every clause omitted: an infinite loop with no wrapping block
        assert_eq!(parse_clean("for (;;) print 1;"), vec!["(while true (print 1.0))"]);
    }

    #[test]
    fn test_declarations() {
        assert_eq!(
            parse_clean(
                "class B < A { init(x) { this.x = x; } get() { return super.get(); } }"
            ),
            vec![
                "(class B < A (method init(x) (; (= (. this x) x))) (method get() (return (call (super get)))))"
            ]
        );
        assert_eq!(
            parse_clean("fun f(a, b) { if (a) return; else print b; }"),
            vec!["(fun f(a b) (if a (return) (print b)))"]
        );
        assert_eq!(parse_clean("var x;"), vec!["(var x)"]);
    }

    #[test]
    fn test_errors_recover_at_statement_boundaries() {
        let (printed, errors) = parse("print ;\nprint 1;\nvar x = ;");

        assert_eq!(
            errors,
            vec![
                "[line 1] Error at ';': Expected expression",
                "[line 3] Error at ';': Expected expression",
            ]
        );
        assert_eq!(printed, vec!["(print 1.0)"]);
    }

    #[test]
    fn test_error_at_end_of_input() {
        let (_, errors) = parse("print 1");

        assert_eq!(errors, vec!["[line 1] Error at end: Expected ';' after value"]);
    }

    #[test]
    fn test_invalid_assignment_target_does_not_unwind() {
        let (printed, errors) = parse("1 + 2 = 3;\nprint 4;");

        assert_eq!(errors, vec!["[line 1] Error at '=': Invalid assignment target"]);
        assert_eq!(printed, vec!["(; (+ 1.0 2.0))", "(print 4.0)"]);
    }

    #[test]
    fn test_argument_limit_is_reported_but_parse_continues() {
        let args: Vec<String> = (0..256).map(|n| n.to_string()).collect();
        let source = format!("f({});\nprint 1;", args.join(", "));

        let (printed, errors) = parse(&source);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("Cannot have more than 255 arguments"));
        assert_eq!(printed.len(), 2);
    }

    #[test]
    fn test_parameter_limit() {
        let params: Vec<String> = (0..256).map(|n| format!("p{}", n)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        let (_, errors) = parse(&source);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("Cannot have more than 255 parameters"));
    }

    #[test]
    fn test_expression_ids_are_distinct_and_continue_across_parsers() {
        let (tokens, mut diagnostics) = scan("a = b; c;");
        let mut parser = Parser::new(&tokens, &mut diagnostics).with_first_id(10);
        let statements = parser.parse();
        let next = parser.next_free_id();

        let mut ids = Vec::new();
        for stmt in &statements {
            if let Stmt::Expression(expr) = stmt {
                collect_ids(expr, &mut ids);
            }
        }
        ids.sort();

        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.0 >= 10 && id.0 < next));
        ids.dedup();
        assert_eq!(ids.len(), 3);

        fn collect_ids(expr: &Expr, ids: &mut Vec<rox::ast::ExprId>) {
            match expr {
                Expr::Variable { id, .. } => ids.push(*id),
                Expr::Assign { id, value, .. } => {
                    ids.push(*id);
                    collect_ids(value, ids);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_empty_token_slice_parses_to_nothing() {
        let mut diagnostics = Diagnostics::new();
        let statements = Parser::new(&[], &mut diagnostics).parse();

        assert!(statements.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_nesting_limit_is_a_parse_error() {
        let depth = MAX_NESTING + 50;
        let source = format!("print {}1{};\nprint 2;", "(".repeat(depth), ")".repeat(depth));

        let (printed, errors) = with_large_stack(move || parse(&source)).expect("parser thread");

        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].ends_with("Too much nesting"));
        assert_eq!(printed, vec!["(print 2.0)"]);
    }

    #[test]
    fn test_unary_chains_count_toward_nesting() {
        let source = format!("print {}1;", "-".repeat(MAX_NESTING + 50));

        let (_, errors) = with_large_stack(move || parse(&source)).expect("parser thread");

        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].ends_with("Too much nesting"));
    }

    #[test]
    fn test_nesting_within_the_limit_parses() {
        let depth = MAX_NESTING / 2;
        let source = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));

        let (printed, errors) = with_large_stack(move || parse(&source)).expect("parser thread");

        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(printed.len(), 1);
        assert!(printed[0].starts_with("(print (group (group"));
    }

    #[test]
    fn test_nested_function_declarations_count_toward_nesting() {
        let depth = MAX_NESTING + 10;
        let source = format!("{}{}", "fun f() {".repeat(depth), "}".repeat(depth));

        let (_, errors) = with_large_stack(move || parse(&source)).expect("parser thread");

        assert!(!errors.is_empty());
        assert!(errors[0].ends_with("Too much nesting"), "{:?}", errors);
    }
}
