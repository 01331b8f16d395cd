//! 실행 모드 선택 (송신 1 / 수신 2)

use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::{Error, Result};

/// 실행 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sender,
    Receiver,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(Mode::Sender),
            "2" => Ok(Mode::Receiver),
            other => Err(Error::InvalidModeSelection(other.to_string())),
        }
    }
}

/// 프롬프트 출력 후 한 줄 읽어서 모드 결정
pub fn prompt_mode<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<Mode> {
    write!(output, "Select mode:\n1. Sender\n2. Receiver\n> ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    line.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("1".parse::<Mode>().unwrap(), Mode::Sender);
        assert_eq!(" 2\n".parse::<Mode>().unwrap(), Mode::Receiver);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        for input in ["", "3", "sender", "12", "-1"] {
            let err = input.parse::<Mode>().unwrap_err();
            assert!(matches!(err, Error::InvalidModeSelection(_)));
        }
    }

    #[test]
    fn test_prompt_mode() {
        let mut output = Vec::new();
        let mode = prompt_mode(&b"2\n"[..], &mut output).unwrap();

        assert_eq!(mode, Mode::Receiver);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Select mode:\n1. Sender\n2. Receiver\n> "
        );
    }

    #[test]
    fn test_prompt_mode_eof_is_invalid() {
        let err = prompt_mode(&b""[..], Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidModeSelection(_)));
    }
}
