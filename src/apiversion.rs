// Copyright 2018-2021 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compute API versions and microversions.

use std::fmt;
use std::str::FromStr;

use super::{Error, ErrorKind};

/// Header carrying the requested Compute microversion.
pub const MICROVERSION_HEADER: &str = "X-OpenStack-Nova-API-Version";

/// API version (major, minor).
///
/// A non-zero minor part is a microversion and is sent to the server with
/// every request.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct ApiVersion(pub u16, pub u16);

impl ApiVersion {
    /// Major version.
    #[inline]
    pub fn major(self) -> u16 {
        self.0
    }

    /// Whether this version requests a microversion.
    #[inline]
    pub fn is_microversion(self) -> bool {
        self.1 != 0
    }

    /// Value of the microversion header, if one has to be sent.
    pub fn microversion_header(self) -> Option<String> {
        if self.is_microversion() {
            Some(self.to_string())
        } else {
            None
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

fn invalid(value: &str) -> Error {
    Error::new(
        ErrorKind::UnsupportedVersion,
        format!("Invalid API version {:?}, expected X, X.Y or vX.Y", value),
    )
}

impl FromStr for ApiVersion {
    type Err = Error;

    /// Parse `2`, `2.53` or `v2.53`.
    fn from_str(s: &str) -> Result<ApiVersion, Error> {
        let trimmed = s.trim();
        let version = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
        match (major.parse(), minor.parse()) {
            (Ok(major), Ok(minor)) => Ok(ApiVersion(major, minor)),
            _ => Err(invalid(s)),
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::ApiVersion;
    use crate::ErrorKind;

    #[test]
    fn test_parse() {
        assert_eq!("2".parse::<ApiVersion>().unwrap(), ApiVersion(2, 0));
        assert_eq!("2.53".parse::<ApiVersion>().unwrap(), ApiVersion(2, 53));
        assert_eq!("v2.1".parse::<ApiVersion>().unwrap(), ApiVersion(2, 1));
        assert_eq!(" 1.1 ".parse::<ApiVersion>().unwrap(), ApiVersion(1, 1));
    }

    #[test]
    fn test_parse_failure() {
        for value in &["", "v", "foo", "2.foo", "2.", "2.1.3", "-1", "2.latest"] {
            let err = value.parse::<ApiVersion>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedVersion, "{}", value);
        }
    }

    #[test]
    fn test_microversion() {
        assert!(!ApiVersion(2, 0).is_microversion());
        assert_eq!(ApiVersion(2, 0).microversion_header(), None);
        assert!(ApiVersion(2, 60).is_microversion());
        assert_eq!(ApiVersion(2, 60).microversion_header().as_deref(), Some("2.60"));
        assert_eq!(ApiVersion(2, 60).major(), 2);
    }

    #[test]
    fn test_ordering() {
        assert!(ApiVersion(2, 9) < ApiVersion(2, 10));
        assert!(ApiVersion(1, 1) < ApiVersion(2, 0));
        assert_eq!(ApiVersion(2, 10).to_string(), "2.10");
    }
}
