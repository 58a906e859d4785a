use procengine::escape::escape;
use procengine::Process;

/// Escaping is round-trip safe: for any argument not containing NUL, a
/// child invoked through the escaper sees exactly that argument back.
#[tokio::test]
async fn escaped_arguments_round_trip_through_a_shell() {
    let candidates = [
        "x",
        "",
        " ",
        "  ",
        r" \ ",
        r" \\ ",
        r" \\\ ",
        r#"""#,
        r#""""#,
        r#"\"\\""#,
        "hello world",
        "it's",
        "æ÷",
        "本",
        "❤",
    ];

    for arg in candidates {
        let command = format!("printf '%s' {}", escape(arg));
        let mut process = Process::new(command);
        let code = process.run(None).await.expect("run");
        assert_eq!(code, 0, "command failed for argument {arg:?}");
        let output = process.get_output().await.unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            arg,
            "round trip failed for argument {arg:?}"
        );
    }
}
