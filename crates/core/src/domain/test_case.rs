use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpectedResult {
    Valid,
    Invalid,
    Satisfiable,
}

impl ExpectedResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Satisfiable => "SATISFIABLE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    pub expected_result: ExpectedResult,
}

impl TestCase {
    pub fn question(&self) -> Option<&str> {
        self.question.as_deref().filter(|text| !text.trim().is_empty())
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref().filter(|text| !text.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Error)]
pub enum TestSuiteError {
    #[error("test cases file `{path}` could not be read: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("test cases file `{path}` is not valid JSON: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("test case {index} has neither a question nor an answer")]
    EmptyCase { index: usize },
    #[error("test number {requested} is out of range; available tests: 1-{available}")]
    OutOfRange { requested: usize, available: usize },
}

impl TestSuite {
    pub fn load(path: &Path) -> Result<Self, TestSuiteError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| TestSuiteError::Read { path: path.to_path_buf(), source })?;
        let suite: Self = serde_json::from_str(&raw)
            .map_err(|source| TestSuiteError::Parse { path: path.to_path_buf(), source })?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn validate(&self) -> Result<(), TestSuiteError> {
        for (offset, case) in self.test_cases.iter().enumerate() {
            if case.question().is_none() && case.answer().is_none() {
                return Err(TestSuiteError::EmptyCase { index: offset + 1 });
            }
        }
        Ok(())
    }

    /// Selects a single case by its 1-based number.
    pub fn select(&self, number: usize) -> Result<&TestCase, TestSuiteError> {
        if number == 0 || number > self.test_cases.len() {
            return Err(TestSuiteError::OutOfRange {
                requested: number,
                available: self.test_cases.len(),
            });
        }
        Ok(&self.test_cases[number - 1])
    }
}
