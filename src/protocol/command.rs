//! Command codes.

use std::fmt;

/// A request the client can send. Discriminants are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    Login = 0x001,
    VoidEval = 0x002,
    Eval = 0x003,
    Shutdown = 0x004,
    OpenFile = 0x010,
    CreateFile = 0x011,
    CloseFile = 0x012,
    ReadFile = 0x013,
    WriteFile = 0x014,
    RemoveFile = 0x015,
    SetSexp = 0x020,
    AssignSexp = 0x021,
    DetachSession = 0x030,
    DetachedVoidEval = 0x031,
    AttachSession = 0x032,
    CtrlEval = 0x042,
    CtrlShutdown = 0x044,
    CtrlSource = 0x045,
    SetBufferSize = 0x081,
    SetEncoding = 0x082,
}

impl Command {
    /// Wire code.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Command::Login => "login",
            Command::VoidEval => "voidEval",
            Command::Eval => "eval",
            Command::Shutdown => "shutdown",
            Command::OpenFile => "openFile",
            Command::CreateFile => "createFile",
            Command::CloseFile => "closeFile",
            Command::ReadFile => "readFile",
            Command::WriteFile => "writeFile",
            Command::RemoveFile => "removeFile",
            Command::SetSexp => "setSEXP",
            Command::AssignSexp => "assignSEXP",
            Command::DetachSession => "detachSession",
            Command::DetachedVoidEval => "detachedVoidEval",
            Command::AttachSession => "attachSession",
            Command::CtrlEval => "ctrlEval",
            Command::CtrlShutdown => "ctrlShutdown",
            Command::CtrlSource => "ctrlSource",
            Command::SetBufferSize => "setBufferSize",
            Command::SetEncoding => "setEncoding",
        }
    }

    /// Look up a command by wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Every command, in code order.
    pub const ALL: [Command; 20] = [
        Command::Login,
        Command::VoidEval,
        Command::Eval,
        Command::Shutdown,
        Command::OpenFile,
        Command::CreateFile,
        Command::CloseFile,
        Command::ReadFile,
        Command::WriteFile,
        Command::RemoveFile,
        Command::SetSexp,
        Command::AssignSexp,
        Command::DetachSession,
        Command::DetachedVoidEval,
        Command::AttachSession,
        Command::CtrlEval,
        Command::CtrlShutdown,
        Command::CtrlSource,
        Command::SetBufferSize,
        Command::SetEncoding,
    ];
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#05x})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_protocol() {
        assert_eq!(Command::Login.code(), 0x001);
        assert_eq!(Command::Eval.code(), 0x003);
        assert_eq!(Command::AssignSexp.code(), 0x021);
        assert_eq!(Command::CtrlSource.code(), 0x045);
        assert_eq!(Command::SetEncoding.code(), 0x082);
    }

    #[test]
    fn test_from_code() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(Command::from_code(0x999), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::Eval.to_string(), "eval(0x003)");
    }
}
