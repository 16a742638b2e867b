use super::*;

fn name(s: &str) -> Box<Expr> {
    Box::new(Expr::Name(s.to_string()))
}

#[test]
fn test_parse_bare_name() {
    let expr = parse("skb").unwrap();
    assert_eq!(expr, Expr::Name("skb".to_string()));
}

#[test]
fn test_parse_pointer_test() {
    let expr = parse("skb != 0").unwrap();
    assert_eq!(
        expr,
        Expr::Binary {
            op: BinOp::Ne,
            left: name("skb"),
            right: Box::new(Expr::Number("0".to_string())),
        }
    );
}

#[test]
fn test_parse_member_chain() {
    let expr = parse("skb->dev->nd_net.net->ns.inum == 0xffffedcba987").unwrap();

    // Chain is left-rooted: (((((skb->dev)->nd_net).net)->ns).inum)
    let Expr::Binary { op, left, right } = expr else {
        panic!("expected binary expression");
    };
    assert_eq!(op, BinOp::Eq);
    assert_eq!(*right, Expr::Number("0xffffedcba987".to_string()));

    let mut steps = Vec::new();
    let mut cur = *left;
    while let Expr::Member { op, base, member } = cur {
        steps.push((op, member));
        cur = *base;
    }
    assert_eq!(cur, Expr::Name("skb".to_string()));
    steps.reverse();
    assert_eq!(
        steps,
        vec![
            (AccessOp::Arrow, "dev".to_string()),
            (AccessOp::Arrow, "nd_net".to_string()),
            (AccessOp::Dot, "net".to_string()),
            (AccessOp::Arrow, "ns".to_string()),
            (AccessOp::Dot, "inum".to_string()),
        ]
    );
}

#[test]
fn test_parse_is_whitespace_insensitive() {
    let spaced = parse("  skb -> len  >\t1024 ").unwrap();
    let dense = parse("skb->len>1024").unwrap();
    assert_eq!(spaced, dense);
}

#[test]
fn test_parse_arithmetic_operator_is_accepted() {
    // Rejection happens in the operator emitter, not the parser.
    let expr = parse("skb->len * 2").unwrap();
    let Expr::Binary { op, .. } = expr else {
        panic!("expected binary expression");
    };
    assert_eq!(op, BinOp::Mul);
}

#[test]
fn test_parse_malformed_literal_is_accepted() {
    let expr = parse("skb->len > 1024x").unwrap();
    let Expr::Binary { right, .. } = expr else {
        panic!("expected binary expression");
    };
    assert_eq!(*right, Expr::Number("1024x".to_string()));
}

#[test]
fn test_parse_rejects_garbage() {
    assert!(parse("").is_err());
    assert!(parse("1 == 1").is_err());
    assert!(parse("skb->").is_err());
    assert!(parse("skb->len == ").is_err());
    assert!(parse("skb->len == len").is_err());
    assert!(parse("(skb)").is_err());
}

#[test]
fn test_parse_int_bases() {
    assert_eq!(parse_int("1024"), Some(1024));
    assert_eq!(parse_int("0x0008"), Some(8));
    assert_eq!(parse_int("0Xff"), Some(255));
    assert_eq!(parse_int("0755"), Some(0o755));
    assert_eq!(parse_int("0o755"), Some(0o755));
    assert_eq!(parse_int("0b1010"), Some(10));
    assert_eq!(parse_int("0"), Some(0));
    assert_eq!(parse_int("1_000_000"), Some(1_000_000));
    assert_eq!(parse_int("0xffffedcba987"), Some(0xffff_edcb_a987));
}

#[test]
fn test_parse_int_char_literals() {
    assert_eq!(parse_int("'a'"), Some(97));
    assert_eq!(parse_int("'\\n'"), Some(10));
    assert_eq!(parse_int("'\\0'"), Some(0));
    assert_eq!(parse_int("''"), None);
    assert_eq!(parse_int("'ab'"), None);
}

#[test]
fn test_parse_int_rejects_bad_literals() {
    assert_eq!(parse_int("1024x"), None);
    assert_eq!(parse_int(""), None);
    assert_eq!(parse_int("0x"), None);
    assert_eq!(parse_int("098"), None);
}
