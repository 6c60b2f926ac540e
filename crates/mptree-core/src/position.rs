//! Insertion and move positions.
//!
//! Positions use the kebab-case names callers see on the wire and on the
//! command line (`first-sibling`, `sorted-child`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Where to place a new node relative to an existing sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiblingPosition {
    FirstSibling,
    Left,
    Right,
    LastSibling,
    SortedSibling,
}

/// Where to move a node relative to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovePosition {
    FirstChild,
    LastChild,
    SortedChild,
    FirstSibling,
    Left,
    Right,
    LastSibling,
    SortedSibling,
}

impl SiblingPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            SiblingPosition::FirstSibling => "first-sibling",
            SiblingPosition::Left => "left",
            SiblingPosition::Right => "right",
            SiblingPosition::LastSibling => "last-sibling",
            SiblingPosition::SortedSibling => "sorted-sibling",
        }
    }

    pub fn is_sorted(self) -> bool {
        self == SiblingPosition::SortedSibling
    }
}

impl MovePosition {
    pub fn as_str(self) -> &'static str {
        match self {
            MovePosition::FirstChild => "first-child",
            MovePosition::LastChild => "last-child",
            MovePosition::SortedChild => "sorted-child",
            MovePosition::FirstSibling => "first-sibling",
            MovePosition::Left => "left",
            MovePosition::Right => "right",
            MovePosition::LastSibling => "last-sibling",
            MovePosition::SortedSibling => "sorted-sibling",
        }
    }

    pub fn is_sorted(self) -> bool {
        matches!(self, MovePosition::SortedChild | MovePosition::SortedSibling)
    }

    /// Child positions map onto the equivalent sibling position relative to
    /// the target's last child.
    pub fn to_sibling(self) -> SiblingPosition {
        match self {
            MovePosition::FirstChild | MovePosition::FirstSibling => SiblingPosition::FirstSibling,
            MovePosition::LastChild | MovePosition::LastSibling => SiblingPosition::LastSibling,
            MovePosition::SortedChild | MovePosition::SortedSibling => {
                SiblingPosition::SortedSibling
            }
            MovePosition::Left => SiblingPosition::Left,
            MovePosition::Right => SiblingPosition::Right,
        }
    }

    pub fn is_child(self) -> bool {
        matches!(
            self,
            MovePosition::FirstChild | MovePosition::LastChild | MovePosition::SortedChild
        )
    }
}

impl From<SiblingPosition> for MovePosition {
    fn from(pos: SiblingPosition) -> Self {
        match pos {
            SiblingPosition::FirstSibling => MovePosition::FirstSibling,
            SiblingPosition::Left => MovePosition::Left,
            SiblingPosition::Right => MovePosition::Right,
            SiblingPosition::LastSibling => MovePosition::LastSibling,
            SiblingPosition::SortedSibling => MovePosition::SortedSibling,
        }
    }
}

impl fmt::Display for SiblingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MovePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiblingPosition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-sibling" => Ok(SiblingPosition::FirstSibling),
            "left" => Ok(SiblingPosition::Left),
            "right" => Ok(SiblingPosition::Right),
            "last-sibling" => Ok(SiblingPosition::LastSibling),
            "sorted-sibling" => Ok(SiblingPosition::SortedSibling),
            _ => Err(CoreError::UnknownPosition(s.to_string())),
        }
    }
}

impl FromStr for MovePosition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-child" => Ok(MovePosition::FirstChild),
            "last-child" => Ok(MovePosition::LastChild),
            "sorted-child" => Ok(MovePosition::SortedChild),
            other => other.parse::<SiblingPosition>().map(MovePosition::from),
        }
    }
}
