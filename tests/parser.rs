#[cfg(test)]
mod parser_tests {
    use rox as lox;

    use lox::ast::{Expr, LiteralValue, Stmt};
    use lox::parser::Parser;
    use lox::session::scan;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, errors) = scan(source);
        assert!(errors.is_empty(), "lex errors: {:?}", errors);

        Parser::new(tokens).parse().expect("program should parse")
    }

    fn parse_errors(source: &str) -> Vec<String> {
        let (tokens, _) = scan(source);

        match Parser::new(tokens).parse() {
            Ok(_) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_precedence_binds_factor_tighter_than_term() {
        let stmts = parse("1 + 2 * 3;");

        let Stmt::Expression(Expr::Binary {
            left,
            operator,
            right,
        }) = &stmts[0]
        else {
            panic!("expected binary expression, got {:?}", stmts[0]);
        };

        assert_eq!(operator.lexeme, "+");
        assert_eq!(**left, Expr::Literal(LiteralValue::Number(1.0)));
        assert!(matches!(&**right, Expr::Binary { operator, .. } if operator.lexeme == "*"));
    }

    #[test]
    fn test_for_loop_is_desugared_into_while() {
        let stmts = parse("for (var i = 0; i < 3; i = i + 1) print i;");

        let Stmt::Block(outer) = &stmts[0] else {
            panic!("expected block, got {:?}", stmts[0]);
        };

        assert!(matches!(&outer[0], Stmt::Var { name, .. } if name.lexeme == "i"));

        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected while, got {:?}", outer[1]);
        };

        let Stmt::Block(inner) = &**body else {
            panic!("expected block body, got {:?}", body);
        };

        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_for_without_clauses_loops_on_true() {
        let stmts = parse("for (;;) break;");

        assert!(matches!(
            &stmts[0],
            Stmt::While {
                condition: Expr::Literal(LiteralValue::True),
                ..
            }
        ));
    }

    #[test]
    fn test_class_with_superclass_and_super_call() {
        let stmts = parse("class B < A { greet() { return super.greet(); } }");

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &stmts[0]
        else {
            panic!("expected class, got {:?}", stmts[0]);
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name.lexeme, "greet");
    }

    #[test]
    fn test_reference_ids_are_unique_and_continue_from_base() {
        let (tokens, _) = scan("a = b; c;");
        let mut parser = Parser::new(tokens).with_first_id(100);
        let stmts = parser.parse().expect("parses");

        let Stmt::Expression(Expr::Assign { id: assign_id, value, .. }) = &stmts[0] else {
            panic!("expected assignment");
        };
        let Expr::Variable { id: b_id, .. } = &**value else {
            panic!("expected variable");
        };
        let Stmt::Expression(Expr::Variable { id: c_id, .. }) = &stmts[1] else {
            panic!("expected variable");
        };

        assert_ne!(assign_id, b_id);
        assert_ne!(b_id, c_id);
        assert!(assign_id.0 >= 100 && b_id.0 >= 100 && c_id.0 >= 100);
        assert!(parser.next_id() > c_id.0);
    }

    #[test]
    fn test_set_expression_from_property_assignment() {
        let stmts = parse("point.x = 3;");

        assert!(matches!(
            &stmts[0],
            Stmt::Expression(Expr::Set { name, .. }) if name.lexeme == "x"
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errors = parse_errors("1 + 2 = 3;");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Invalid assignment target"));
    }

    #[test]
    fn test_parser_recovers_and_reports_every_statement_error() {
        let errors = parse_errors("var = 1;\nprint 2;\nvar y = ;\n");

        assert_eq!(errors.len(), 2, "got {:?}", errors);
        assert!(errors[0].starts_with("[line 1]"));
        assert!(errors[1].starts_with("[line 3]"));
    }
}
