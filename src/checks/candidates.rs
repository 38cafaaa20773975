//! Candidate paths probed for each artifact type
//!
//! Order matters: the first existing path wins, so a root-level file always
//! shadows copies under `docs/` or `.github/`.

pub const LICENSE: &[&str] = &[
    "LICENSE",
    "LICENSE.md",
    "LICENSE.txt",
    "LICENCE",
    "LICENCE.md",
    "LICENCE.txt",
    "COPYING",
    "docs/LICENSE",
    "docs/LICENSE.md",
    "docs/LICENSE.txt",
    ".github/LICENSE",
    ".github/LICENSE.md",
    ".github/LICENSE.txt",
];

pub const README: &[&str] = &[
    "README.md",
    "README.txt",
    "README",
    "docs/README.md",
    "docs/README.txt",
    "docs/README",
    ".github/README.md",
    ".github/README.txt",
    ".github/README",
];

pub const CITATION: &[&str] = &["CITATION.cff"];

pub const CODEMETA: &[&str] = &["codemeta.json"];

pub const CONTRIBUTING: &[&str] = &[
    "CONTRIBUTING.md",
    "CONTRIBUTING.txt",
    "CONTRIBUTING",
    "docs/CONTRIBUTING.md",
    "docs/CONTRIBUTING.txt",
    "docs/CONTRIBUTING",
    ".github/CONTRIBUTING.md",
    ".github/CONTRIBUTING.txt",
    ".github/CONTRIBUTING",
];

pub const CODE_OF_CONDUCT: &[&str] = &[
    "CODE_OF_CONDUCT.md",
    "CODE_OF_CONDUCT.txt",
    "CODE_OF_CONDUCT",
    "docs/CODE_OF_CONDUCT.md",
    "docs/CODE_OF_CONDUCT.txt",
    "docs/CODE_OF_CONDUCT",
    ".github/CODE_OF_CONDUCT.md",
    ".github/CODE_OF_CONDUCT.txt",
    ".github/CODE_OF_CONDUCT",
];
