//! Dirty signal - 서버와 슈퍼바이저 사이의 stderr 기반 규약
//!
//! 서버는 재시작이 필요할 때 마커 문자열이 들어간 한 줄을 stderr에 쓰고,
//! 슈퍼바이저는 자식의 stderr 각 줄에서 마커를 찾습니다.
//! 마커는 예약어입니다. 일반 로그에 이 문구를 쓰면 재시작이 트리거됩니다.

use std::io::Write;
use std::path::Path;

/// 예약된 마커 문자열
pub const DIRTY_MARKER: &str = "marking server as dirty";

/// dirty 신호 한 줄 생성 (개행 제외)
pub fn dirty_line(kind: impl std::fmt::Display, path: &Path) -> String {
    format!(
        "[hot-reload] Include file {}: {}, {}",
        kind,
        path.display(),
        DIRTY_MARKER
    )
}

/// dirty 신호를 writer에 기록하고 flush
pub fn write_dirty_line<W: Write>(
    writer: &mut W,
    kind: impl std::fmt::Display,
    path: &Path,
) -> std::io::Result<()> {
    writeln!(writer, "{}", dirty_line(kind, path))?;
    writer.flush()
}

/// 진단 출력 한 줄이 dirty 신호인지 확인
pub fn is_dirty_signal(line: &str) -> bool {
    line.contains(DIRTY_MARKER)
}
