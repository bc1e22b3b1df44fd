//! Dependency resolution for change plans.
//!
//! Dependencies for a change come from two sources, unioned: a static
//! type-to-type dependency table, and reference-shaped values found in the
//! change's property bag. Both are matched only against other changes in
//! the same plan.

use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::types::Change;

/// Property keys whose values commonly reference other resources.
const REFERENCE_PROPERTIES: &[&str] = &[
    "subnetId",
    "subnetIds",
    "vpcId",
    "securityGroupId",
    "securityGroupIds",
    "roleArn",
    "instanceProfileArn",
    "targetGroupArn",
    "loadBalancerArn",
    "dbSubnetGroupName",
    "keyName",
];

/// Anchored patterns for directly referenced resource ids.
const ID_PATTERNS: &[&str] = &[
    r"^(i-[a-f0-9]+)$",
    r"^(subnet-[a-f0-9]+)$",
    r"^(vpc-[a-f0-9]+)$",
    r"^(sg-[a-f0-9]+)$",
    r"^(igw-[a-f0-9]+)$",
    r"^(rtb-[a-f0-9]+)$",
];

/// Static type-to-type dependency rules.
fn default_dependency_rules() -> HashMap<String, Vec<String>> {
    let rules: &[(&str, &[&str])] = &[
        (
            "EC2::Instance",
            &["VPC::Subnet", "EC2::SecurityGroup", "EC2::KeyPair"],
        ),
        (
            "RDS::DBInstance",
            &["VPC::Subnet", "RDS::DBSubnetGroup", "EC2::SecurityGroup"],
        ),
        ("Lambda::Function", &["IAM::Role", "VPC::Subnet"]),
        (
            "ECS::Service",
            &["ECS::Cluster", "ECS::TaskDefinition", "VPC::Subnet"],
        ),
        ("ALB::LoadBalancer", &["VPC::Subnet", "EC2::SecurityGroup"]),
        ("ALB::TargetGroup", &["VPC::VPC"]),
        ("RDS::DBSubnetGroup", &["VPC::Subnet"]),
        ("VPC::Subnet", &["VPC::VPC"]),
        ("VPC::InternetGateway", &["VPC::VPC"]),
        ("VPC::RouteTable", &["VPC::VPC"]),
        ("VPC::Route", &["VPC::RouteTable", "VPC::InternetGateway"]),
        ("IAM::InstanceProfile", &["IAM::Role"]),
        ("S3::BucketPolicy", &["S3::Bucket"]),
        (
            "CloudWatch::Alarm",
            &["Lambda::Function", "EC2::Instance", "RDS::DBInstance"],
        ),
    ];

    rules
        .iter()
        .map(|(ty, deps)| {
            (
                (*ty).to_string(),
                deps.iter().map(|d| (*d).to_string()).collect(),
            )
        })
        .collect()
}

/// Matcher that extracts resource ids from reference-shaped property values.
///
/// The property-name list and id-shape patterns are ordered and replaceable,
/// so new reference conventions can be added without touching the sort or
/// risk logic.
#[derive(Debug)]
pub struct ReferenceMatcher {
    /// Property keys to inspect.
    reference_properties: Vec<String>,
    /// Compiled id-shape patterns, tried in order.
    id_patterns: Vec<Regex>,
}

impl Default for ReferenceMatcher {
    fn default() -> Self {
        Self::new(
            REFERENCE_PROPERTIES.iter().map(ToString::to_string),
            ID_PATTERNS.iter().copied(),
        )
    }
}

impl ReferenceMatcher {
    /// Builds a matcher from property names and id-shape patterns.
    ///
    /// Patterns that fail to compile are skipped.
    pub fn new(
        properties: impl IntoIterator<Item = String>,
        patterns: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        Self {
            reference_properties: properties.into_iter().collect(),
            id_patterns: patterns
                .into_iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }

    /// Returns true if the property key is reference-shaped.
    #[must_use]
    pub fn is_reference_property(&self, key: &str) -> bool {
        self.reference_properties.iter().any(|p| p == key)
    }

    /// Extracts a resource id from a property value, if it matches a known
    /// shape. Handles ARNs (last path segment) and direct id references.
    #[must_use]
    pub fn extract_resource_id(&self, value: &str) -> Option<String> {
        if let Some(rest) = value.strip_prefix("arn:aws:") {
            let parts: Vec<&str> = rest.split(':').collect();
            // arn:aws:service:region:account:resource has 4 parts after the prefix
            if parts.len() >= 4 {
                return parts
                    .last()
                    .and_then(|p| p.split('/').next_back())
                    .map(ToString::to_string);
            }
            return None;
        }

        for pattern in &self.id_patterns {
            if let Some(captures) = pattern.captures(value) {
                if let Some(m) = captures.get(1) {
                    return Some(m.as_str().to_string());
                }
            }
        }

        None
    }
}

/// Resolver that computes the dependency list for each change.
#[derive(Debug)]
pub struct DependencyResolver {
    /// Type-to-type dependency rules.
    rules: HashMap<String, Vec<String>>,
    /// Property reference matcher.
    matcher: ReferenceMatcher,
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self {
            rules: default_dependency_rules(),
            matcher: ReferenceMatcher::default(),
        }
    }
}

impl DependencyResolver {
    /// Creates a resolver with the built-in rules and matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the reference matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: ReferenceMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Replaces the type-to-type dependency rules.
    #[must_use]
    pub fn with_rules(mut self, rules: HashMap<String, Vec<String>>) -> Self {
        self.rules = rules;
        self
    }

    /// Finds the resource ids the given change depends on, restricted to
    /// ids that are themselves changes in the plan.
    #[must_use]
    pub fn resolve(&self, change: &Change, all_changes: &[Change]) -> Vec<String> {
        let mut dependencies = Vec::new();
        let mut seen = HashSet::new();

        // Type-table dependencies: other changes whose type this one requires.
        if let Some(required_types) = self.rules.get(&change.resource_type) {
            for other in all_changes {
                if other.resource_id != change.resource_id
                    && required_types.contains(&other.resource_type)
                    && seen.insert(other.resource_id.clone())
                {
                    dependencies.push(other.resource_id.clone());
                }
            }
        }

        // Property-reference dependencies from the desired configuration.
        if let Some(config) = &change.desired_config {
            let plan_ids: HashSet<&str> = all_changes
                .iter()
                .map(|c| c.resource_id.as_str())
                .collect();

            for (key, value) in &config.properties {
                if !self.matcher.is_reference_property(key) {
                    continue;
                }

                for candidate in Self::string_values(value) {
                    if let Some(id) = self.matcher.extract_resource_id(candidate) {
                        if id != change.resource_id
                            && plan_ids.contains(id.as_str())
                            && seen.insert(id.clone())
                        {
                            dependencies.push(id);
                        }
                    }
                }
            }
        }

        dependencies
    }

    /// Collects the string values of a property: the value itself, or the
    /// string members of a list value.
    fn string_values(value: &serde_json::Value) -> Vec<&str> {
        match value {
            serde_json::Value::String(s) => vec![s.as_str()],
            serde_json::Value::Array(items) => {
                items.iter().filter_map(serde_json::Value::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}
