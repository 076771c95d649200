use super::{Level, Report};
use crate::snippet::Snippet;
use crate::source::Source;

#[test]
fn snippet_single_line() {
  let src = "lorem ipsum dolor sit amet consectetur adipiscing elit";

  assert_eq!(
    Snippet::new(src, 6..17),
    Snippet {
      s: "lorem ipsum dolor sit amet consectetur adipiscing elit".into(),
      line: 1,
      count: 1,
      span: (6..17).into(),
    }
  );
}

#[test]
fn snippet_multi_line() {
  struct Case {
    src: &'static str,
    src_span: std::ops::Range<usize>,
    snippet: Snippet<'static>,
  }

  let tests = vec![
    Case {
      src: "lorem ipsum\ndolor sit amet\nconsectetur adipiscing elit",
      src_span: 6..17,
      snippet: Snippet {
        s: "lorem ipsum\ndolor sit amet".into(),
        line: 1,
        count: 2,
        span: (6..17).into(),
      },
    },
    Case {
      src: "lorem ipsum\ndolor sit amet\nconsectetur adipiscing elit",
      src_span: 17..31,
      snippet: Snippet {
        s: "dolor sit amet\nconsectetur adipiscing elit".into(),
        line: 2,
        count: 2,
        span: (5..19).into(),
      },
    },
    Case {
      src: "\n\\n",
      src_span: 1..3,
      snippet: Snippet {
        s: "\\n".into(),
        line: 2,
        count: 1,
        span: (0..2).into(),
      },
    },
    Case {
      src: "d(                 ",
      src_span: 19..19,
      snippet: Snippet {
        s: "d(".into(),
        line: 1,
        count: 1,
        span: (2..2).into(),
      },
    },
    Case {
      src: "\u{9389a}\"\n",
      src_span: 4..6,
      snippet: Snippet {
        s: "\u{9389a}\"".into(),
        line: 1,
        count: 1,
        span: (4..5).into(),
      },
    },
    Case {
      src: "x ",
      src_span: 0..2,
      snippet: Snippet {
        s: "x".into(),
        line: 1,
        count: 1,
        span: (0..1).into(),
      },
    },
    Case {
      src: "З  ",
      src_span: 0..2,
      snippet: Snippet {
        s: "З".into(),
        line: 1,
        count: 1,
        span: (0..2).into(),
      },
    },
    Case {
      src: "\"\n\\",
      src_span: 0..2,
      snippet: Snippet {
        s: "\"\n\\".into(),
        line: 1,
        count: 2,
        span: (0..1).into(),
      },
    },
  ];

  for (i, case) in tests.iter().enumerate() {
    let snippet = Snippet::new(case.src, case.src_span.clone());
    assert_eq!(snippet, case.snippet, "[Test #{i}] Snippets mismatch");
    assert_eq!(
      case.src[case.src_span.start..case.src_span.end]
        .trim_end_matches('\n')
        .trim_end_matches(' '),
      snippet.highlight(),
      "[Test #{i}] Highlighted slices mismatch"
    );
  }
}

#[test]
fn emit_report_single_line() {
  let report = Report {
    level: Level::Error,
    source: Source::file("test.pl0", "x := 10\ny := 20;"),
    message: "expected semicolon".into(),
    span: (7..8).into(),
    label: None,
    color: false,
  };
  let out = report.emit_to_string().unwrap();
  assert!(out.starts_with("error: expected semicolon\n"));
  assert!(out.contains("test.pl0:1"));
  assert!(out.contains("x := 10"));
}

#[test]
fn emit_report_multi_line() {
  let report = Report {
    level: Level::Error,
    source: Source::file("test.pl0", "begin\n  x := 0;\n  y := 0\nend"),
    message: "expected semicolon".into(),
    span: (6..24).into(),
    label: Some("missing `;` before `end`".into()),
    color: false,
  };
  let out = report.emit_to_string().unwrap();
  assert!(out.contains("test.pl0:2"));
  assert!(out.contains("missing `;` before `end`"));
}

#[test]
fn emit_report_no_color_has_no_escape_codes() {
  let report = Report {
    level: Level::Error,
    source: Source::file("test.pl0", "call undeclared"),
    message: "undeclared identifier".into(),
    span: (5..15).into(),
    label: None,
    color: false,
  };
  let out = report.emit_to_string().unwrap();
  assert!(!out.contains('\u{1b}'));
}

#[test]
fn emit_report_color_has_escape_codes() {
  let report = Report {
    level: Level::Error,
    source: Source::file("test.pl0", "call undeclared"),
    message: "undeclared identifier".into(),
    span: (5..15).into(),
    label: None,
    color: true,
  };
  let out = report.emit_to_string().unwrap();
  assert!(out.contains('\u{1b}'));
}

#[test]
fn emit_report_out_of_bounds_span_errors() {
  let report = Report {
    level: Level::Error,
    source: Source::file("test.pl0", "x := 0"),
    message: "oops".into(),
    span: (0..100).into(),
    label: None,
    color: false,
  };
  assert!(matches!(
    report.emit_to_string(),
    Err(super::EmitError::OutOfBounds)
  ));
}
