//! # Autoscaling
//!
//! HorizontalPodAutoscaler for the console workload. Target utilization per
//! resource follows [`UtilizationPolicy`]: a container with a lot of headroom
//! between request and limit can run hotter before scaling out.

use super::{Inputs, Quantities};
use crate::constants::APP_NAME;
use crate::controller::reconciler::compare::ParsedQuantity;
use crate::controller::reconciler::types::ReconcilerError;
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
    MetricSpec, MetricTarget, ResourceMetricSource,
};

/// Maps the limit/request ratio of a resource to a target average utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilizationPolicy {
    /// Ratio (limit / request, percent) at or above which `high_target` applies
    pub threshold_percent: i32,
    pub high_target: i32,
    pub low_target: i32,
}

impl Default for UtilizationPolicy {
    fn default() -> Self {
        Self {
            threshold_percent: 130,
            high_target: 90,
            low_target: 70,
        }
    }
}

impl UtilizationPolicy {
    /// Target utilization for one resource
    ///
    /// # Errors
    ///
    /// Returns `InvalidObject` when either quantity does not parse.
    pub fn target(&self, resource: &str, request: &str, limit: &str) -> Result<i32, ReconcilerError> {
        let parse = |value: &str| {
            ParsedQuantity::parse(value).map_err(|e| {
                ReconcilerError::invalid("ConsoleUI", format!("{resource} quantity '{value}': {e}"))
            })
        };
        let request = parse(request)?;
        let limit = parse(limit)?;
        let ratio = limit.percent_of(&request);
        Ok(match ratio {
            Some(ratio) if ratio >= i128::from(self.threshold_percent) => self.high_target,
            _ => self.low_target,
        })
    }
}

fn resource_metric(name: &str, average_utilization: i32) -> MetricSpec {
    MetricSpec {
        type_: "Resource".to_string(),
        resource: Some(ResourceMetricSource {
            name: name.to_string(),
            target: MetricTarget {
                type_: "Utilization".to_string(),
                average_utilization: Some(average_utilization),
                ..Default::default()
            },
        }),
        ..Default::default()
    }
}

fn targets(
    policy: &UtilizationPolicy,
    requests: &Quantities,
    limits: &Quantities,
) -> Result<(i32, i32), ReconcilerError> {
    Ok((
        policy.target("cpu", &requests.cpu, &limits.cpu)?,
        policy.target("memory", &requests.memory, &limits.memory)?,
    ))
}

/// HorizontalPodAutoscaler scaling the console Deployment
///
/// # Errors
///
/// Returns `InvalidObject` when a sizing quantity does not parse.
pub fn horizontal_pod_autoscaler(
    inputs: &Inputs<'_>,
) -> Result<HorizontalPodAutoscaler, ReconcilerError> {
    let settings = &inputs.settings;
    let min_replicas = settings.replicas.max(1);
    let max_replicas = settings.max_replicas.max(min_replicas);
    let (cpu_target, memory_target) = targets(
        &inputs.utilization,
        &settings.sizing.requests,
        &settings.sizing.limits,
    )?;

    Ok(HorizontalPodAutoscaler {
        metadata: inputs.metadata(APP_NAME),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: APP_NAME.to_string(),
            },
            min_replicas: Some(min_replicas),
            max_replicas,
            metrics: Some(vec![
                resource_metric("cpu", cpu_target),
                resource_metric("memory", memory_target),
            ]),
            behavior: None,
        }),
        ..Default::default()
    })
}
