//! Composite identifiers.
//!
//! The API has no compound keys for some resources, so several logical
//! parts are folded into one opaque string:
//!
//! | kind            | shape                                    |
//! |-----------------|------------------------------------------|
//! | image           | `id:KIND` or `id:computePoolId:KIND`     |
//! | attached disk   | `vmId:diskIndex`                         |
//! | private IP      | `networkId/address`                      |
//! | firewall rule   | `ruleId`, taken from a firewall ACL href |
//!
//! Every kind is a value type built only through these parse and format
//! routines. Decoding never guesses: a string with the wrong delimiter or
//! part count is a [`DecodeError`].

use std::fmt;
use std::str::FromStr;

use crate::credentials::{API_PREFIX, strip_prefix_ignore_case, strip_scheme_and_host};

const IMAGE_DELIMITER: char = ':';
const DISK_DELIMITER: char = ':';
const PRIVATE_IP_DELIMITER: char = '/';

/// Collection segment firewall rule hrefs live under.
pub const FIREWALL_ACL_COLLECTION: &str = "firewallAcls";

/// Identifier kinds handled by the codec.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IdKind {
    /// Template or catalog image.
    Image,
    /// Disk attached to a virtual machine.
    Disk,
    /// Private IP address inside a network.
    PrivateIp,
    /// Firewall ACL rule.
    FirewallRule,
}

impl IdKind {
    /// Name used in error messages and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Disk => "disk",
            Self::PrivateIp => "private-ip",
            Self::FirewallRule => "firewall-rule",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdKind {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "disk" => Ok(Self::Disk),
            "private-ip" | "privateip" => Ok(Self::PrivateIp),
            "firewall-rule" | "firewallrule" => Ok(Self::FirewallRule),
            _ => Err(DecodeError::new(None, value, "unknown identifier kind")),
        }
    }
}

/// Raised when a string does not have the shape its kind requires.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodeError {
    /// Kind being decoded, when known.
    pub kind: Option<IdKind>,
    /// Offending input.
    pub input: String,
    /// What was wrong with it.
    pub reason: String,
}

impl DecodeError {
    fn new(kind: Option<IdKind>, input: &str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            input: input.to_owned(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.kind.map_or("composite", IdKind::as_str);
        write!(
            f,
            "cannot decode {label} identifier '{}': {}",
            self.input, self.reason
        )
    }
}

impl std::error::Error for DecodeError {}

/// Whether an image id names a template or a catalog entry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ImageKind {
    /// Template instantiated inside a compute pool.
    Template,
    /// Organization catalog entry.
    Catalog,
}

impl ImageKind {
    /// Upper-case marker used in encoded ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Template => "TEMPLATE",
            Self::Catalog => "CATALOG",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image identifier: `id[:computePoolId]:KIND`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ImageId {
    /// Template or catalog entry identifier.
    pub resource_id: String,
    /// Compute pool the template belongs to.
    pub compute_pool_id: Option<String>,
    /// Template or catalog marker.
    pub kind: ImageKind,
}

impl ImageId {
    /// Template image inside `compute_pool_id`.
    #[must_use]
    pub fn template(resource_id: impl Into<String>, compute_pool_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            compute_pool_id: Some(compute_pool_id.into()),
            kind: ImageKind::Template,
        }
    }

    /// Catalog image.
    #[must_use]
    pub fn catalog(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            compute_pool_id: None,
            kind: ImageKind::Catalog,
        }
    }

    fn parts(&self) -> Vec<String> {
        let mut parts = vec![self.resource_id.clone()];
        parts.extend(self.compute_pool_id.clone());
        parts.push(self.kind.as_str().to_owned());
        parts
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.parts(), IMAGE_DELIMITER))
    }
}

impl FromStr for ImageId {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(IdKind::Image, value, IMAGE_DELIMITER, 2..=3)?;
        let fail = |reason: &str| DecodeError::new(Some(IdKind::Image), value, reason);
        let (resource_id, compute_pool_id, marker) = match parts.as_slice() {
            [resource, marker] => (*resource, None, *marker),
            [resource, pool, marker] => (*resource, Some(*pool), *marker),
            _ => return Err(fail("expected 2 or 3 parts")),
        };
        let kind = if marker.eq_ignore_ascii_case(ImageKind::Template.as_str()) {
            ImageKind::Template
        } else if marker.eq_ignore_ascii_case(ImageKind::Catalog.as_str()) {
            ImageKind::Catalog
        } else {
            return Err(fail("last part must be TEMPLATE or CATALOG"));
        };
        Ok(Self {
            resource_id: resource_id.to_owned(),
            compute_pool_id: compute_pool_id.map(str::to_owned),
            kind,
        })
    }
}

/// Attached disk identifier: `vmId:diskIndex`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DiskId {
    /// Owning virtual machine.
    pub vm_id: String,
    /// Position of the disk on the machine.
    pub index: u32,
}

impl DiskId {
    /// Disk `index` of machine `vm_id`.
    #[must_use]
    pub fn new(vm_id: impl Into<String>, index: u32) -> Self {
        Self {
            vm_id: vm_id.into(),
            index,
        }
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{DISK_DELIMITER}{}", self.vm_id, self.index)
    }
}

impl FromStr for DiskId {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(IdKind::Disk, value, DISK_DELIMITER, 2..=2)?;
        let [vm_id, index] = parts.as_slice() else {
            return Err(DecodeError::new(Some(IdKind::Disk), value, "expected 2 parts"));
        };
        let parsed_index = index.parse::<u32>().map_err(|_| {
            DecodeError::new(
                Some(IdKind::Disk),
                value,
                "disk index must be a non-negative integer",
            )
        })?;
        Ok(Self::new(*vm_id, parsed_index))
    }
}

/// Private IP identifier: `networkId/address`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PrivateIpId {
    /// Network the address belongs to.
    pub network_id: String,
    /// Address within the network.
    pub address: String,
}

impl PrivateIpId {
    /// Address `address` inside network `network_id`.
    #[must_use]
    pub fn new(network_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for PrivateIpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PRIVATE_IP_DELIMITER}{}", self.network_id, self.address)
    }
}

impl FromStr for PrivateIpId {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = split_exact(IdKind::PrivateIp, value, PRIVATE_IP_DELIMITER, 2..=2)?;
        let [network_id, address] = parts.as_slice() else {
            return Err(DecodeError::new(
                Some(IdKind::PrivateIp),
                value,
                "expected 2 parts",
            ));
        };
        Ok(Self::new(*network_id, *address))
    }
}

/// Firewall rule identifier.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FirewallRuleId(String);

impl FirewallRuleId {
    /// Wraps a bare rule id.
    #[must_use]
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self(rule_id.into())
    }

    /// Extracts the rule id from a firewall ACL href such as
    /// `/cloudapi/ecloud/firewallAcls/42`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the href is not under the firewall ACL
    /// collection or does not end in a single id segment.
    pub fn from_href(href: &str) -> Result<Self, DecodeError> {
        resource_id_from_href(href, FIREWALL_ACL_COLLECTION)
            .map(Self)
            .map_err(|err| DecodeError {
                kind: Some(IdKind::FirewallRule),
                ..err
            })
    }

    /// Bare rule id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FirewallRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FirewallRuleId {
    type Err = DecodeError;

    /// Accepts either a bare id or a firewall ACL href.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.contains('/') {
            return Self::from_href(trimmed);
        }
        if trimmed.is_empty() {
            return Err(DecodeError::new(
                Some(IdKind::FirewallRule),
                value,
                "empty rule id",
            ));
        }
        Ok(Self::new(trimmed))
    }
}

/// Tagged union over every supported identifier kind.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CompositeId {
    /// Image identifier.
    Image(ImageId),
    /// Attached disk identifier.
    Disk(DiskId),
    /// Private IP identifier.
    PrivateIp(PrivateIpId),
    /// Firewall rule identifier.
    FirewallRule(FirewallRuleId),
}

impl CompositeId {
    /// Decodes `value` as an identifier of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the shape does not match `kind`.
    pub fn decode(kind: IdKind, value: &str) -> Result<Self, DecodeError> {
        match kind {
            IdKind::Image => value.parse().map(Self::Image),
            IdKind::Disk => value.parse().map(Self::Disk),
            IdKind::PrivateIp => value.parse().map(Self::PrivateIp),
            IdKind::FirewallRule => value.parse().map(Self::FirewallRule),
        }
    }

    /// Kind of this identifier.
    #[must_use]
    pub const fn kind(&self) -> IdKind {
        match self {
            Self::Image(_) => IdKind::Image,
            Self::Disk(_) => IdKind::Disk,
            Self::PrivateIp(_) => IdKind::PrivateIp,
            Self::FirewallRule(_) => IdKind::FirewallRule,
        }
    }

    /// Logical parts in encoding order.
    #[must_use]
    pub fn parts(&self) -> Vec<String> {
        match self {
            Self::Image(id) => id.parts(),
            Self::Disk(id) => vec![id.vm_id.clone(), id.index.to_string()],
            Self::PrivateIp(id) => vec![id.network_id.clone(), id.address.clone()],
            Self::FirewallRule(id) => vec![id.0.clone()],
        }
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(id) => write!(f, "{id}"),
            Self::Disk(id) => write!(f, "{id}"),
            Self::PrivateIp(id) => write!(f, "{id}"),
            Self::FirewallRule(id) => write!(f, "{id}"),
        }
    }
}

/// Joins `parts` into an identifier of `kind`.
///
/// # Errors
///
/// Returns [`DecodeError`] when the part count or content is not valid for
/// `kind`. The joined string is run back through the decoder and must give
/// back exactly `parts`, so `"template"` or a disk index of `"007"` is
/// rejected rather than silently changed.
pub fn encode_id<S: AsRef<str>>(kind: IdKind, parts: &[S]) -> Result<String, DecodeError> {
    let delimiter = match kind {
        IdKind::Image => IMAGE_DELIMITER,
        IdKind::Disk => DISK_DELIMITER,
        IdKind::PrivateIp => PRIVATE_IP_DELIMITER,
        IdKind::FirewallRule => {
            if parts.len() != 1 {
                return Err(DecodeError::new(
                    Some(kind),
                    &join(parts, '/'),
                    "expected exactly 1 part",
                ));
            }
            '/'
        }
    };
    let joined = join(parts, delimiter);
    if kind == IdKind::FirewallRule && joined.contains('/') {
        return Err(DecodeError::new(Some(kind), &joined, "rule id contains '/'"));
    }
    let decoded = decode_id(kind, &joined)?;
    let canonical = decoded.len() == parts.len()
        && decoded
            .iter()
            .zip(parts)
            .all(|(round_tripped, part)| round_tripped == part.as_ref());
    if !canonical {
        return Err(DecodeError::new(Some(kind), &joined, "non-canonical part"));
    }
    Ok(joined)
}

/// Splits an identifier of `kind` into its parts.
///
/// # Errors
///
/// Returns [`DecodeError`] when the shape does not match `kind`.
pub fn decode_id(kind: IdKind, value: &str) -> Result<Vec<String>, DecodeError> {
    CompositeId::decode(kind, value).map(|id| id.parts())
}

/// Extracts the trailing id from an href under `collection`.
///
/// The API prefix and collection are matched case-insensitively because
/// hrefs returned by the API are not consistently cased; a leading scheme and
/// host are ignored.
///
/// # Errors
///
/// Returns [`DecodeError`] when the href is not under the collection or the
/// remainder is not a single non-empty segment.
pub fn resource_id_from_href(href: &str, collection: &str) -> Result<String, DecodeError> {
    let fail = |reason: String| DecodeError::new(None, href, reason);
    let without_host = strip_scheme_and_host(href.trim());
    let expected = format!("{API_PREFIX}/{}/", collection.trim_matches('/'));
    let rest = strip_prefix_ignore_case(without_host, &expected)
        .ok_or_else(|| fail(format!("expected an href starting with {expected}")))?;
    let id = rest.split(['?', '#']).next().unwrap_or_default().trim_end_matches('/');
    if id.is_empty() || id.contains('/') {
        return Err(fail(String::from("expected a single id segment")));
    }
    Ok(id.to_owned())
}

fn split_exact(
    kind: IdKind,
    value: &str,
    delimiter: char,
    expected: std::ops::RangeInclusive<usize>,
) -> Result<Vec<&str>, DecodeError> {
    let parts: Vec<&str> = value.split(delimiter).collect();
    if !expected.contains(&parts.len()) {
        let reason = if expected.start() == expected.end() {
            format!(
                "expected {} parts separated by '{delimiter}', found {}",
                expected.start(),
                parts.len()
            )
        } else {
            format!(
                "expected {} to {} parts separated by '{delimiter}', found {}",
                expected.start(),
                expected.end(),
                parts.len()
            )
        };
        return Err(DecodeError::new(Some(kind), value, reason));
    }
    if parts.iter().any(|part| part.trim().is_empty()) {
        return Err(DecodeError::new(Some(kind), value, "empty part"));
    }
    Ok(parts)
}

fn join<S: AsRef<str>>(parts: &[S], delimiter: char) -> String {
    let mut joined = String::new();
    for (position, part) in parts.iter().enumerate() {
        if position > 0 {
            joined.push(delimiter);
        }
        joined.push_str(part.as_ref());
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn image_with_pool_decodes_into_three_parts() {
        assert_eq!(
            decode_id(IdKind::Image, "abc:pool1:TEMPLATE"),
            Ok(vec![
                String::from("abc"),
                String::from("pool1"),
                String::from("TEMPLATE")
            ])
        );
    }

    #[test]
    fn image_marker_is_case_tolerant_and_normalized() {
        let id: ImageId = "55:catalog".parse().expect("catalog id");
        assert_eq!(id, ImageId::catalog("55"));
        assert_eq!(id.to_string(), "55:CATALOG");
    }

    #[rstest]
    #[case(IdKind::Image, "abc")]
    #[case(IdKind::Image, "abc:pool:TEMPLATE:extra")]
    #[case(IdKind::Image, "abc:pool:OTHER")]
    #[case(IdKind::Image, "abc::TEMPLATE")]
    #[case(IdKind::Disk, "vm-1")]
    #[case(IdKind::Disk, "vm-1:one")]
    #[case(IdKind::Disk, "vm-1:-1")]
    #[case(IdKind::Disk, "vm-1:2:3")]
    #[case(IdKind::PrivateIp, "net-1:10.0.0.4")]
    #[case(IdKind::PrivateIp, "net-1/")]
    #[case(IdKind::FirewallRule, "")]
    #[case(IdKind::FirewallRule, "/cloudapi/ecloud/virtualMachines/4")]
    fn malformed_ids_fail_to_decode(#[case] kind: IdKind, #[case] input: &str) {
        let error = decode_id(kind, input).expect_err("decode should fail");
        assert_eq!(error.kind, Some(kind));
        assert_eq!(error.input, input);
    }

    #[rstest]
    #[case(CompositeId::Image(ImageId::template("t-9", "cp-3")))]
    #[case(CompositeId::Image(ImageId::catalog("c-1")))]
    #[case(CompositeId::Disk(DiskId::new("vm-7", 2)))]
    #[case(CompositeId::PrivateIp(PrivateIpId::new("net-5", "10.1.2.3")))]
    #[case(CompositeId::FirewallRule(FirewallRuleId::new("812")))]
    fn encode_and_decode_round_trip(#[case] id: CompositeId) {
        let parts = id.parts();
        let encoded = encode_id(id.kind(), &parts).expect("parts encode");
        assert_eq!(encoded, id.to_string());
        assert_eq!(decode_id(id.kind(), &encoded), Ok(parts));
        assert_eq!(CompositeId::decode(id.kind(), &encoded), Ok(id));
    }

    #[test]
    fn encode_rejects_wrong_part_count() {
        let error = encode_id(IdKind::Disk, &["vm-1"]).expect_err("one part is not a disk id");
        assert_eq!(error.kind, Some(IdKind::Disk));
        assert!(encode_id(IdKind::FirewallRule, &["a", "b"]).is_err());
    }

    #[rstest]
    #[case(IdKind::Image, &["abc", "pool1", "template"])]
    #[case(IdKind::Image, &["abc", "pool1", "Catalog"])]
    #[case(IdKind::Disk, &["vm-1", "007"])]
    #[case(IdKind::Disk, &["vm-1", "+5"])]
    fn encode_rejects_parts_that_decode_differently(
        #[case] kind: IdKind,
        #[case] parts: &[&str],
    ) {
        let error = encode_id(kind, parts).expect_err("non-canonical part must be rejected");
        assert_eq!(error.kind, Some(kind));
        assert_eq!(error.reason, "non-canonical part");
    }

    #[rstest]
    #[case("/cloudapi/ecloud/firewallAcls/42", "42")]
    #[case("/CLOUDAPI/ECLOUD/FIREWALLACLS/42", "42")]
    #[case("https://host.example/cloudapi/ecloud/firewallacls/42/", "42")]
    #[case("/cloudapi/ecloud/firewallAcls/42?expand=true", "42")]
    fn firewall_rule_ids_come_from_hrefs(#[case] href: &str, #[case] expected: &str) {
        let id = FirewallRuleId::from_href(href).expect("valid href");
        assert_eq!(id.as_str(), expected);
        let parsed: FirewallRuleId = href.parse().expect("valid href");
        assert_eq!(parsed, id);
    }

    #[rstest]
    #[case("/cloudapi/ecloud/firewallAcls/")]
    #[case("/cloudapi/ecloud/firewallAcls/42/rules/1")]
    #[case("/cloudapi/ecloud/firewallAclsX/42")]
    fn firewall_rule_hrefs_with_wrong_shape_fail(#[case] href: &str) {
        let error = FirewallRuleId::from_href(href).expect_err("href should be rejected");
        assert_eq!(error.kind, Some(IdKind::FirewallRule));
    }

    #[test]
    fn resource_id_from_href_handles_other_collections() {
        assert_eq!(
            resource_id_from_href("/cloudapi/ecloud/VirtualMachines/77", "virtualMachines"),
            Ok(String::from("77"))
        );
    }

    #[rstest]
    #[case("image", IdKind::Image)]
    #[case("DISK", IdKind::Disk)]
    #[case("private-ip", IdKind::PrivateIp)]
    #[case("firewall-rule", IdKind::FirewallRule)]
    fn id_kinds_parse_from_names(#[case] raw: &str, #[case] expected: IdKind) {
        assert_eq!(raw.parse::<IdKind>(), Ok(expected));
    }

    #[test]
    fn decode_error_message_names_kind_and_input() {
        let error = decode_id(IdKind::Image, "abc").expect_err("too few parts");
        assert_eq!(
            error.to_string(),
            "cannot decode image identifier 'abc': expected 2 to 3 parts separated by ':', found 1"
        );
    }
}
