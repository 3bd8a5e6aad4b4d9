//! EC2 response types

use aws_sdk_ec2::types::Instance;

/// One page of DescribeInstances output, reservations flattened
#[derive(Debug, Clone, Default)]
pub struct InstancePage {
    pub instances: Vec<Instance>,
    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}
