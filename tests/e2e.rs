//! End-to-end tests: whole files through scanner and parser threads.

mod common;

use common::rule;
use vakefile_rs::{
    Error, LabelNode, MacroNode, Node, Options, ParseErrorKind, ParserEnv, RuleNode, VariableNode,
    parse, parse_str, parse_with,
};

const FRONTEND: &str = "\
#!/usr/bin/env vake
# Front-end build.

include_rules
NODE_ENV = production
JS = src/*.js

!uglify = |> uglify %f -o %o |> dist/
!css = foreach |> csso %f -o %o |>

ifeq ($(NODE_ENV), production)
: $(JS) |> !uglify |> app.min.js
else
: $(JS) |> cat %f > %o |> app.js
endif

: foreach styles/*.css |> !css |> %B.min.css

deploy: build
  rsync -a dist/ host:/srv
  echo done
";

fn variable(name: &str) -> Node {
    Node::Variable(VariableNode {
        name: name.to_string(),
        append: false,
    })
}

fn macro_def(name: &str) -> Node {
    Node::Macro(MacroNode {
        name: name.to_string(),
    })
}

#[test]
fn full_vakefile() {
    let vakefile = parse_str(FRONTEND, ParserEnv::new()).expect("should parse");
    assert_eq!(
        vakefile.nodes,
        vec![
            Node::IncludeRules,
            variable("NODE_ENV"),
            variable("JS"),
            macro_def("uglify"),
            macro_def("css"),
            Node::Rule(rule(&["src/*.js"], "uglify %f -o %o", "dist/ app.min.js")),
            Node::Rule(RuleNode {
                foreach: true,
                inputs: vec!["styles/*.css".to_string()],
                command: "csso %f -o %o".to_string(),
                output: "%B.min.css".to_string(),
            }),
            Node::Label(LabelNode {
                name: "deploy".to_string(),
                deps: vec!["build".to_string()],
                code: vec![
                    "rsync -a dist/ host:/srv".to_string(),
                    "echo done".to_string(),
                ],
            }),
        ]
    );
    assert_eq!(vakefile.env.var("NODE_ENV"), Some("production"));
    assert_eq!(vakefile.env.macros.len(), 2);
}

#[test]
fn other_branch_when_env_overrides() {
    // A later assignment wins over the caller's value.
    let env = ParserEnv::new().with_var("NODE_ENV", "development");
    let vakefile = parse_str(FRONTEND, env).expect("should parse");
    let first_rule = vakefile
        .nodes
        .iter()
        .find_map(Node::as_rule)
        .expect("a rule");
    assert_eq!(first_rule.command, "uglify %f -o %o");

    let dev = FRONTEND.replace("NODE_ENV = production", "NODE_ENV = development");
    let vakefile = parse_str(&dev, ParserEnv::new()).expect("should parse");
    let first_rule = vakefile
        .nodes
        .iter()
        .find_map(Node::as_rule)
        .expect("a rule");
    assert_eq!(first_rule, &rule(&["src/*.js"], "cat %f > %o", "app.js"));
}

#[test]
fn environment_carries_across_parses() {
    let base = "CC = clang\n!cc = |> $(CC) -c %f -o %o |> build/\n";
    let env = parse("base.vake", base, ParserEnv::new())
        .finish()
        .expect("base should parse");

    let app = "include base.vake\nCC += -O2\n: foreach *.c |> !cc |> %B.o\n: *.c |> $(CC) %f |> app";
    let mut parse = parse("app.vake", app, env);
    let nodes: Vec<_> = parse
        .by_ref()
        .collect::<Result<_, _>>()
        .expect("app should parse");
    let env = parse.finish().expect("finished");

    let rules: Vec<_> = nodes.iter().filter_map(Node::as_rule).collect();
    assert_eq!(rules[0].command, "clang -c %f -o %o");
    assert_eq!(rules[0].output, "build/ %B.o");
    assert_eq!(rules[1].command, "clang -O2 %f");
    assert_eq!(env.var("CC"), Some("clang -O2"));
    assert!(env.macro_rule("cc").is_some());
}

#[test]
fn error_names_the_failing_file() {
    let err = parse("lib/Vakefile", "A = 1\n\n: x |> !nope |> y", ParserEnv::new())
        .finish()
        .expect_err("should fail");
    let Error::Parse(err) = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(
        err.kind,
        ParseErrorKind::UndefinedMacro {
            name: "nope".to_string()
        }
    );
    assert_eq!(err.span.file.as_deref(), Some("lib/Vakefile"));
    assert_eq!(err.span.line, 3);
}

#[test]
fn long_input_through_tight_channels() {
    let input: String = (0..500)
        .map(|i| format!(": src/part{}.js |> cat %f |> out/part{}.js\n", alpha(i), alpha(i)))
        .collect();
    let options = Options::new("big")
        .with_token_capacity(1)
        .with_node_capacity(1);
    let nodes: Vec<_> = parse_with(options, &input, ParserEnv::new())
        .collect::<Result<_, _>>()
        .expect("should parse");
    assert_eq!(nodes.len(), 500);
    for (i, node) in nodes.iter().enumerate() {
        let rule = node.as_rule().expect("rule");
        assert_eq!(rule.inputs, [format!("src/part{}.js", alpha(i))]);
    }
}

#[test]
fn error_after_many_nodes_drains_scanner() {
    let mut input = ": a |> b |> c\n".repeat(100);
    input.push_str(": |> missing input |> d\n");
    input.push_str(&": e |> f |> g\n".repeat(100));
    let items: Vec<_> = parse_with(
        Options::new("").with_token_capacity(2),
        &input,
        ParserEnv::new(),
    )
    .collect();
    assert_eq!(items.len(), 101);
    assert!(matches!(
        items.last(),
        Some(Err(Error::Parse(err))) if err.kind == ParseErrorKind::EmptyInput
    ));
}

#[test]
fn default_options() {
    let options = Options::default();
    assert!(options.name.is_empty());
    assert_eq!(options.token_capacity, 16);
    assert_eq!(options.node_capacity, 16);
}

/// Digits are not identifier runes, so number the parts with letters.
fn alpha(mut i: usize) -> String {
    let mut out = String::new();
    loop {
        out.push(char::from(b'a' + u8::try_from(i % 26).expect("below 26")));
        i /= 26;
        if i == 0 {
            return out;
        }
    }
}
