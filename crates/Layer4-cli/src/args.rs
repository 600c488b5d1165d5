//! Launcher 인자 파싱
//!
//! ```text
//! hotmcp [--include <pattern>]... [raw...] [-- <command> [args...]]
//! hotmcp [--include <pattern>]... cmd:<command> [args...]
//! ```
//!
//! `cmd:` 형식이 어디에든 있으면 `--` 형식보다 우선합니다.

use hotmcp_task::ChildCommand;

/// 파싱된 launcher 인자
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LauncherArgs {
    /// `--include` 패턴 (반복 가능)
    pub include: Vec<String>,

    /// 자식 명령 (없으면 번들 서버)
    pub command: Option<String>,
    pub command_args: Vec<String>,

    /// 인식하지 못한 인자 (확장용으로 보존)
    pub raw: Vec<String>,
}

/// 인자 목록 파싱 (프로그램 이름 제외)
pub fn parse_args<I, S>(argv: I) -> LauncherArgs
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
    let mut parsed = LauncherArgs::default();

    // cmd: 위치 (있으면 그 앞까지만 일반 규칙 적용)
    let legacy = argv.iter().position(|arg| arg.starts_with("cmd:"));
    let end = legacy.unwrap_or(argv.len());

    let mut i = 0;
    while i < end {
        let arg = &argv[i];

        if arg == "--include" {
            i += 1;
            if i < end {
                parsed.include.push(argv[i].clone());
            }
        } else if let Some(pattern) = arg.strip_prefix("--include=") {
            parsed.include.push(pattern.to_string());
        } else if arg == "--" {
            if legacy.is_none() {
                let mut rest = argv[i + 1..].iter().cloned();
                parsed.command = rest.next();
                parsed.command_args = rest.collect();
            }
            break;
        } else {
            parsed.raw.push(arg.clone());
        }
        i += 1;
    }

    if let Some(index) = legacy {
        parsed.command = Some(argv[index]["cmd:".len()..].to_string());
        parsed.command_args = argv[index + 1..].to_vec();
    }

    // 빈 명령 (`--` 뒤가 비었거나 `cmd:`만 있음)은 기본값 사용
    if parsed.command.as_deref() == Some("") {
        parsed.command = None;
        parsed.command_args.clear();
    }

    parsed
}

/// 실행할 자식 명령 결정
pub fn build_command(args: &LauncherArgs) -> ChildCommand {
    match &args.command {
        Some(command) => ChildCommand::new(command, args.command_args.clone()),
        None => ChildCommand::default_server(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_is_repeatable() {
        let args = parse_args(["--include", "src/**/*.rs", "--include=*.conf"]);
        assert_eq!(args.include, vec!["src/**/*.rs", "*.conf"]);
        assert_eq!(args.command, None);
    }

    #[test]
    fn test_separator_form() {
        let args = parse_args(["--include", "*.ts", "--", "node", "server.js", "--port", "1"]);
        assert_eq!(args.include, vec!["*.ts"]);
        assert_eq!(args.command.as_deref(), Some("node"));
        assert_eq!(args.command_args, vec!["server.js", "--port", "1"]);
    }

    #[test]
    fn test_legacy_form() {
        let args = parse_args(["--include", "*.ts", "cmd:python", "main.py", "--include", "x"]);
        assert_eq!(args.include, vec!["*.ts"]);
        assert_eq!(args.command.as_deref(), Some("python"));
        assert_eq!(args.command_args, vec!["main.py", "--include", "x"]);
    }

    #[test]
    fn test_legacy_form_takes_precedence() {
        let args = parse_args(["--", "node", "server.js", "cmd:deno", "run", "main.ts"]);
        assert_eq!(args.command.as_deref(), Some("deno"));
        assert_eq!(args.command_args, vec!["run", "main.ts"]);
    }

    #[test]
    fn test_raw_args_are_collected() {
        let args = parse_args(["--verbose", "extra", "--include", "a"]);
        assert_eq!(args.raw, vec!["--verbose", "extra"]);
        assert_eq!(args.include, vec!["a"]);
    }

    #[test]
    fn test_dangling_include_and_empty_command() {
        let args = parse_args(["--include"]);
        assert!(args.include.is_empty());

        let args = parse_args(["--"]);
        assert_eq!(args.command, None);

        let args = parse_args(["cmd:"]);
        assert_eq!(args.command, None);
    }

    #[test]
    fn test_build_command() {
        let args = parse_args(["--", "node", "server.js"]);
        let command = build_command(&args);
        assert_eq!(command.program.to_str(), Some("node"));
        assert_eq!(command.args, vec!["server.js"]);

        let command = build_command(&LauncherArgs::default());
        assert!(command
            .program
            .to_string_lossy()
            .contains(hotmcp_task::DEFAULT_SERVER_BIN));
        assert!(command.args.is_empty());
    }
}
