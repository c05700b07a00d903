use crate::error::ParseDomainsError;

use itertools::Itertools;
use std::fmt;
use std::str::FromStr;

/// Parsed value of the `domains` attribute of a [MultiDomainFunction](crate::MultiDomainFunction)
/// member
///
/// Accepted forms:
/// - `"All"`: every domain, the same as having no assignment at all
/// - `"i"`: the domain with the same index as the function
/// - `""`: no domain, the function contributes nothing
/// - `"3"` or `"0, 2, 5"`: explicit domain indices
/// - `"2 - 4"`: inclusive increasing range
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainSelector {
    All,
    OwnIndex,
    Indices(Vec<usize>),
}

impl DomainSelector {
    /// Explicit domain list for the function with index `function_index`, `None` means all
    pub fn into_assignment(self, function_index: usize) -> Option<Vec<usize>> {
        match self {
            Self::All => None,
            Self::OwnIndex => Some(vec![function_index]),
            Self::Indices(indices) => Some(indices),
        }
    }

    /// Selector describing a stored assignment
    pub fn from_assignment(function_index: usize, assignment: Option<&[usize]>) -> Self {
        match assignment {
            None => Self::All,
            Some(&[single]) if single == function_index => Self::OwnIndex,
            Some(indices) => Self::Indices(indices.to_vec()),
        }
    }
}

fn parse_index(token: &str) -> Result<usize, ParseDomainsError> {
    token
        .trim()
        .parse()
        .map_err(|_| ParseDomainsError::InvalidToken(token.trim().to_owned()))
}

impl FromStr for DomainSelector {
    type Err = ParseDomainsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => Ok(Self::Indices(vec![])),
            "All" => Ok(Self::All),
            "i" => Ok(Self::OwnIndex),
            _ => {
                if let Some((start, end)) = s.split_once('-') {
                    let start = parse_index(start)?;
                    let end = parse_index(end)?;
                    if start >= end {
                        return Err(ParseDomainsError::InvalidRange { start, end });
                    }
                    Ok(Self::Indices((start..=end).collect()))
                } else {
                    s.split(',')
                        .map(parse_index)
                        .collect::<Result<_, _>>()
                        .map(Self::Indices)
                }
            }
        }
    }
}

impl fmt::Display for DomainSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::OwnIndex => write!(f, "i"),
            Self::Indices(indices) => write!(f, "{}", indices.iter().join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<DomainSelector, ParseDomainsError> {
        s.parse()
    }

    #[test]
    fn keywords() {
        assert_eq!(parse("All"), Ok(DomainSelector::All));
        assert_eq!(parse(" i "), Ok(DomainSelector::OwnIndex));
        assert_eq!(parse(""), Ok(DomainSelector::Indices(vec![])));
        assert_eq!(parse("   "), Ok(DomainSelector::Indices(vec![])));
    }

    #[test]
    fn lists() {
        assert_eq!(parse("3"), Ok(DomainSelector::Indices(vec![3])));
        assert_eq!(parse("0, 2,5"), Ok(DomainSelector::Indices(vec![0, 2, 5])));
    }

    #[test]
    fn ranges() {
        assert_eq!(parse("2 - 4"), Ok(DomainSelector::Indices(vec![2, 3, 4])));
        assert_eq!(parse("0-1"), Ok(DomainSelector::Indices(vec![0, 1])));
        assert_eq!(
            parse("4 - 2"),
            Err(ParseDomainsError::InvalidRange { start: 4, end: 2 })
        );
        assert_eq!(
            parse("3 - 3"),
            Err(ParseDomainsError::InvalidRange { start: 3, end: 3 })
        );
    }

    #[test]
    fn malformed() {
        for s in ["all", "x", "1,,2", "1, a", "-2", "1 - ", "1.5", "1 - 2 - 3"] {
            assert!(parse(s).is_err(), "{:?} should be rejected", s);
        }
        assert_eq!(
            parse("1, a"),
            Err(ParseDomainsError::InvalidToken("a".to_owned()))
        );
    }

    #[test]
    fn assignment_round_trip() {
        assert_eq!(DomainSelector::from_assignment(1, None).to_string(), "All");
        assert_eq!(DomainSelector::from_assignment(1, Some(&[1])).to_string(), "i");
        assert_eq!(DomainSelector::from_assignment(1, Some(&[2])).to_string(), "2");
        assert_eq!(DomainSelector::from_assignment(1, Some(&[])).to_string(), "");
        assert_eq!(
            DomainSelector::from_assignment(0, Some(&[0, 3])).to_string(),
            "0,3"
        );
        assert_eq!(parse("i").unwrap().into_assignment(2), Some(vec![2]));
        assert_eq!(parse("All").unwrap().into_assignment(2), None);
    }
}
