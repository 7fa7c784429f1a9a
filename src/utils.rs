// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Configuration helpers.

use std::time::Duration;

use log::warn;
use serde_yaml::{Mapping, Value};

use super::{Error, ErrorKind};

/// Parse a boolean setting.
///
/// Accepts `1/0`, `true/false`, `yes/no` and `on/off` in any case.
pub fn parse_bool(name: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::new(
            ErrorKind::InvalidConfig,
            format!("{} must be a boolean, got {}", name, other),
        )),
    }
}

/// Parse a positive timeout in (possibly fractional) seconds.
pub fn parse_timeout(name: &str, value: &str) -> Result<Duration, Error> {
    match value.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => Ok(Duration::from_secs_f64(seconds)),
        _ => Err(Error::new(
            ErrorKind::InvalidConfig,
            format!("{} must be a positive number of seconds, got {}", name, value),
        )),
    }
}

/// Merge two nested YAML mappings.
///
/// The values from `src` are merged into `dest`. With `overwrite`, values in
/// `src` replace the scalar values in `dest`.
pub fn merge_mappings(src: Mapping, dest: &mut Mapping, overwrite: bool) {
    for (src_key, src_value) in src {
        match src_value {
            Value::Mapping(src_mapping) => match dest.get_mut(&src_key) {
                Some(Value::Mapping(dest_mapping)) => {
                    merge_mappings(src_mapping, dest_mapping, overwrite);
                }
                Some(dest_value) => {
                    warn!(
                        "Type mismatch while merging mappings: expected {:?} to be a mapping",
                        dest_value
                    );
                    if overwrite {
                        *dest_value = Value::Mapping(src_mapping);
                    }
                }
                None => {
                    let _ = dest.insert(src_key, Value::Mapping(src_mapping));
                }
            },
            other => {
                if overwrite || !dest.contains_key(&src_key) {
                    let _ = dest.insert(src_key, other);
                }
            }
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::time::Duration;

    use super::{merge_mappings, parse_bool, parse_timeout};
    use crate::ErrorKind;

    pub(crate) fn to_yaml<S: AsRef<str>>(source: S) -> serde_yaml::Mapping {
        let value = serde_yaml::from_str(source.as_ref()).unwrap();
        match value {
            serde_yaml::Value::Mapping(map) => map,
            _ => panic!("Unexpected {:?}", value),
        }
    }

    #[test]
    fn test_parse_bool() {
        for value in &["1", "true", "True", "yes", "ON"] {
            assert!(parse_bool("X", value).unwrap());
        }
        for value in &["0", "false", "No", "off", ""] {
            assert!(!parse_bool("X", value).unwrap());
        }
        let err = parse_bool("OS_INSECURE", "maybe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.message().contains("OS_INSECURE"));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("T", "30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_timeout("T", "0.5").unwrap(), Duration::from_millis(500));
        assert!(parse_timeout("T", "0").is_err());
        assert!(parse_timeout("T", "-1").is_err());
        assert!(parse_timeout("T", "soon").is_err());
    }

    #[test]
    fn test_merge_clouds() {
        let src = to_yaml(
            r#"
clouds:
  cloud_name:
    auth:
      username: user2
      password: password1
    region_name: region2
  other:
    auth:
      password: password2"#,
        );

        let mut dest = to_yaml(
            r#"
clouds:
  cloud_name:
    auth:
      username: user1
      tenant_name: project1
      auth_url: "url1"
    region_name: region1"#,
        );

        merge_mappings(src, &mut dest, true);

        let clouds = dest.get("clouds").unwrap().as_mapping().unwrap();
        let cloud = clouds.get("cloud_name").unwrap().as_mapping().unwrap();
        assert_eq!(cloud.get("region_name").unwrap().as_str(), Some("region2"));

        let auth = cloud.get("auth").unwrap().as_mapping().unwrap();
        assert_eq!(auth.get("username").unwrap().as_str(), Some("user2"));
        assert_eq!(auth.get("password").unwrap().as_str(), Some("password1"));
        assert_eq!(auth.get("tenant_name").unwrap().as_str(), Some("project1"));
        assert_eq!(auth.get("auth_url").unwrap().as_str(), Some("url1"));

        // Clouds only present in the source are added.
        let other = clouds.get("other").unwrap().as_mapping().unwrap();
        let auth = other.get("auth").unwrap().as_mapping().unwrap();
        assert_eq!(auth.get("password").unwrap().as_str(), Some("password2"));
    }

    #[test]
    fn test_merge_without_overwrite() {
        let src = to_yaml("region_name: region2\ninterface: internal");
        let mut dest = to_yaml("region_name: region1");
        merge_mappings(src, &mut dest, false);
        assert_eq!(dest.get("region_name").unwrap().as_str(), Some("region1"));
        assert_eq!(dest.get("interface").unwrap().as_str(), Some("internal"));
    }
}
