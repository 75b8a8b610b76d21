use freshen_json::{
    escape, print_b64, print_dbl, print_str, printf, unescape_to_vec, Arg, DynamicBuf, FixedBuf,
    Output, StreamOut,
};
use proptest::prelude::*;
use serde_json::Value;

proptest! {
    #[test]
    fn escape_round_trip(s in "[a-zA-Z0-9 \"\\\\/\u{8}\u{c}\n\r\t]{0,32}") {
        let escaped = escape(&s);
        prop_assert_eq!(unescape_to_vec(escaped.as_bytes()), Some(s.into_bytes()));
    }

    #[test]
    fn printed_strings_parse_back(s in any::<String>()) {
        let mut out = DynamicBuf::new();
        print_str(&mut out, s.as_bytes());
        let parsed: String = serde_json::from_slice(out.as_bytes()).unwrap();
        prop_assert_eq!(parsed, s);
    }

    #[test]
    fn printed_numbers_parse_back(v in -1.0e9f64..1.0e9) {
        let mut out = DynamicBuf::new();
        print_dbl(&mut out, v);
        let parsed: f64 = serde_json::from_slice(out.as_bytes()).unwrap();
        // Six significant digits.
        prop_assert!((parsed - v).abs() <= v.abs() * 1e-5 + 1e-9);
    }

    #[test]
    fn fixed_sink_never_overruns(cap in 0usize..64, s in "[a-z\"]{0,64}") {
        let mut storage = vec![0u8; cap];
        let mut out = FixedBuf::new(&mut storage);
        let n = print_str(&mut out, s.as_bytes());
        prop_assert!(n <= cap);
        prop_assert_eq!(out.len(), n);
    }
}

#[test]
fn envelope_matrix() {
    let result = |out: &mut dyn Output| print_b64(out, b"hi");
    let mut out = DynamicBuf::new();
    printf(
        &mut out,
        "{%Q:%s,%Q:{%Q:%M,%Q:%d}}",
        &[
            Arg::Str("id"),
            Arg::Str("7"),
            Arg::Str("result"),
            Arg::Str("data"),
            Arg::Fmt(&result),
            Arg::Str("left"),
            Arg::Int(0),
        ],
    )
    .unwrap();
    let v: Value = serde_json::from_slice(out.as_bytes()).unwrap();
    assert_eq!(v["id"], 7);
    assert_eq!(v["result"]["data"], "aGk=");
    assert_eq!(v["result"]["left"], 0);
}

#[test]
fn stream_sink_matrix() {
    let mut out = StreamOut::new(Vec::new());
    let n = printf(&mut out, "[%B,%g,%Q]", &[Arg::Bool(false), Arg::Float(1e-7), Arg::Str("\t")]).unwrap();
    let bytes = out.into_inner();
    assert_eq!(n, bytes.len());
    assert_eq!(bytes, br#"[false,1e-07,"\t"]"#);
}
