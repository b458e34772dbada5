//! Extension table deciding which files end up in the notebook and how
//! `minted` highlights them.

/// A source language recognized by its file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Cpp,
    C,
    Java,
    Python,
    Go,
    /// Raw LaTeX, embedded without a listing block
    Tex,
}

impl Language {
    /// Looks up a file extension, leading `.` included (e.g. `".cpp"`).
    ///
    /// Matching is case-sensitive: `.CPP` is not recognized.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            ".cc" | ".cpp" | ".hpp" => Some(Self::Cpp),
            ".c" => Some(Self::C),
            ".java" => Some(Self::Java),
            ".py" => Some(Self::Python),
            ".go" => Some(Self::Go),
            ".tex" => Some(Self::Tex),
            _ => None,
        }
    }

    /// Lexer name handed to `\begin{minted}{...}`
    pub fn label(self) -> &'static str {
        match self {
            Self::Cpp => "C++",
            Self::C => "c",
            Self::Java => "java",
            Self::Python => "python",
            Self::Go => "golang",
            Self::Tex => "tex",
        }
    }

    pub fn is_raw_markup(self) -> bool {
        self == Self::Tex
    }
}
