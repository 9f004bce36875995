//! Typed description of the cloud resources the service runs on.
//!
//! Nothing here is on the request path: the `synth` binary evaluates
//! the stack exactly once and hands the resulting plan to the external
//! provisioning tool, which performs all create/update/destroy work.

use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while assembling or synthesizing a stack.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SynthError {
    #[error("duplicate logical id {0:?}")]
    DuplicateId(String),

    #[error("resource {id:?} depends on unknown resource {dependency:?}")]
    UnknownDependency { id: String, dependency: String },

    #[error("dependency cycle involving {0:?}")]
    DependencyCycle(String),
}

/// Teardown behavior requested for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

/// Authentication mode of a function URL. `None` makes the endpoint
/// publicly invokable; it is spelled out here so the posture is a
/// visible, reviewable choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrlAuthType {
    None,
    AwsIam,
}

/// Ownership and mode bits applied when the access point creates its
/// root directory on a fresh filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct PosixAcl {
    pub owner_uid: u32,
    pub owner_gid: u32,
    pub permissions: String,
}

/// Identity enforced on every filesystem operation through the access
/// point.
#[derive(Debug, Clone, Serialize)]
pub struct PosixUser {
    pub uid: u32,
    pub gid: u32,
}

/// Cross-origin policy attached to the public URL.
#[derive(Debug, Clone, Serialize)]
pub struct CorsPolicy {
    pub allowed_origins: Vec<String>,
}

/// Filesystem attachment for the compute function.
#[derive(Debug, Clone, Serialize)]
pub struct EfsMount {
    pub access_point: String,
    pub mount_path: String,
}

/// One cloud resource, by kind. Fields referring to other resources
/// hold their logical ids.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceSpec {
    Vpc {
        name: String,
    },
    FileSystem {
        name: String,
        vpc: String,
        removal_policy: RemovalPolicy,
    },
    AccessPoint {
        file_system: String,
        path: String,
        create_acl: PosixAcl,
        posix_user: PosixUser,
    },
    Function {
        name: String,
        image_dir: String,
        memory_mb: u32,
        timeout_secs: u64,
        vpc: String,
        mount: Option<EfsMount>,
    },
    Bucket {
        name: String,
        versioned: bool,
        removal_policy: RemovalPolicy,
        auto_delete_objects: bool,
    },
    BucketDeployment {
        bucket: String,
        source_dir: String,
    },
    BucketReadGrant {
        bucket: String,
        grantee: String,
    },
    FunctionUrl {
        function: String,
        auth: UrlAuthType,
        cors: CorsPolicy,
    },
    UrlInvokePermission {
        function: String,
        principal: String,
        action: String,
    },
}

/// A resource entry as it appears in the synthesized plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedResource {
    pub logical_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(flatten)]
    pub spec: ResourceSpec,
}

/// Stack-level value exposed after deployment, e.g. the function URL.
/// `value` is an attribute reference the provisioning tool resolves.
#[derive(Debug, Clone, Serialize)]
pub struct StackOutput {
    pub name: String,
    pub value: String,
}

/// Dependency-ordered deployment plan.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub stack_name: String,
    pub resources: Vec<PlannedResource>,
    pub outputs: Vec<StackOutput>,
}

struct Resource {
    id: String,
    spec: ResourceSpec,
    depends_on: Vec<String>,
}

/// Ordered registry of the resources making up one deployment.
pub struct Stack {
    name: String,
    resources: Vec<Resource>,
    outputs: Vec<StackOutput>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Registers a resource under a unique logical id and returns that
    /// id for wiring into dependents. Dependency references are checked
    /// at synthesis time, so declarations may arrive in any order.
    pub fn add(
        &mut self,
        id: &str,
        spec: ResourceSpec,
        depends_on: &[&str],
    ) -> Result<String, SynthError> {
        if self.resources.iter().any(|resource| resource.id == id) {
            return Err(SynthError::DuplicateId(id.to_owned()));
        }
        self.resources.push(Resource {
            id: id.to_owned(),
            spec,
            depends_on: depends_on.iter().map(|dep| (*dep).to_owned()).collect(),
        });
        Ok(id.to_owned())
    }

    /// Declares a stack output.
    pub fn output(&mut self, name: &str, value: &str) {
        self.outputs.push(StackOutput {
            name: name.to_owned(),
            value: value.to_owned(),
        });
    }

    /// Resolves the dependency graph into a provisioning order.
    ///
    /// A resource appears only after everything it depends on; ties are
    /// broken by declaration order, so the same stack always yields the
    /// same plan. Unknown references and cycles are rejected.
    pub fn synth(&self) -> Result<Template, SynthError> {
        let ids: HashSet<&str> = self.resources.iter().map(|r| r.id.as_str()).collect();
        for resource in &self.resources {
            for dep in &resource.depends_on {
                if !ids.contains(dep.as_str()) {
                    return Err(SynthError::UnknownDependency {
                        id: resource.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let n = self.resources.len();
        let index_of = |id: &str| {
            self.resources
                .iter()
                .position(|r| r.id == id)
                .expect("reference validated above")
        };
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, resource) in self.resources.iter().enumerate() {
            for dep in &resource.depends_on {
                dependents[index_of(dep)].push(i);
                indegree[i] += 1;
            }
        }

        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while let Some(next) = (0..n).find(|&i| !placed[i] && indegree[i] == 0) {
            placed[next] = true;
            order.push(next);
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
            }
        }
        if order.len() != n {
            let stuck = (0..n).find(|&i| !placed[i]).expect("some resource is unplaced");
            return Err(SynthError::DependencyCycle(self.resources[stuck].id.clone()));
        }

        Ok(Template {
            stack_name: self.name.clone(),
            resources: order
                .into_iter()
                .map(|i| {
                    let resource = &self.resources[i];
                    PlannedResource {
                        logical_id: resource.id.clone(),
                        depends_on: resource.depends_on.clone(),
                        spec: resource.spec.clone(),
                    }
                })
                .collect(),
            outputs: self.outputs.clone(),
        })
    }
}

/// Deploy-time knobs for the prediction stack.
///
/// Security-relevant settings (URL auth mode, cross-origin policy) are
/// explicit fields rather than provider defaults, so narrowing the
/// posture is a one-line change per deployment.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub stack_name: String,
    pub vpc_name: String,
    pub bucket_name: String,
    /// Directory whose Dockerfile packages the function image
    pub image_dir: String,
    /// Local directory seeded into the bucket at deployment time
    pub model_source_dir: String,
    pub access_point_path: String,
    pub mount_path: String,
    pub posix_user: PosixUser,
    pub create_acl: PosixAcl,
    pub memory_mb: u32,
    pub timeout_secs: u64,
    pub url_auth: UrlAuthType,
    pub allowed_origins: Vec<String>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "PredictionStack".to_owned(),
            vpc_name: "PredictionVpc".to_owned(),
            bucket_name: "models-bucket".to_owned(),
            image_dir: ".".to_owned(),
            model_source_dir: "model_files".to_owned(),
            access_point_path: "/export/lambda".to_owned(),
            mount_path: "/mnt/models".to_owned(),
            posix_user: PosixUser { uid: 1001, gid: 1001 },
            create_acl: PosixAcl {
                owner_uid: 1001,
                owner_gid: 1001,
                permissions: "750".to_owned(),
            },
            memory_mb: 768,
            timeout_secs: 30,
            url_auth: UrlAuthType::None,
            allowed_origins: vec!["*".to_owned()],
        }
    }
}

/// Builds the resource graph backing the prediction service.
///
/// Provisioning follows the attachment chain: the network first, the
/// shared filesystem and its access point on top of it, the container
/// function wired into both, then the seeded model bucket with a read
/// grant for the function, and finally the public URL.
pub fn prediction_stack(config: &StackConfig) -> Result<Stack, SynthError> {
    let mut stack = Stack::new(&config.stack_name);

    let vpc = stack.add(
        "Vpc",
        ResourceSpec::Vpc {
            name: config.vpc_name.clone(),
        },
        &[],
    )?;

    let file_system = stack.add(
        "ModelFs",
        ResourceSpec::FileSystem {
            name: "ModelFs".to_owned(),
            vpc: vpc.clone(),
            removal_policy: RemovalPolicy::Destroy,
        },
        &[&vpc],
    )?;

    let access_point = stack.add(
        "ModelFsAccessPoint",
        ResourceSpec::AccessPoint {
            file_system: file_system.clone(),
            path: config.access_point_path.clone(),
            // The directory does not exist on a fresh filesystem; it is
            // created with this ACL on first mount.
            create_acl: config.create_acl.clone(),
            posix_user: config.posix_user.clone(),
        },
        &[&file_system],
    )?;

    let function = stack.add(
        "PredictionFunction",
        ResourceSpec::Function {
            name: "PredictionFunction".to_owned(),
            image_dir: config.image_dir.clone(),
            memory_mb: config.memory_mb,
            timeout_secs: config.timeout_secs,
            vpc: vpc.clone(),
            mount: Some(EfsMount {
                access_point: access_point.clone(),
                mount_path: config.mount_path.clone(),
            }),
        },
        &[&vpc, &access_point],
    )?;

    let bucket = stack.add(
        "ModelsBucket",
        ResourceSpec::Bucket {
            name: config.bucket_name.clone(),
            versioned: true,
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
        },
        &[],
    )?;

    stack.add(
        "ModelsBucketDeployment",
        ResourceSpec::BucketDeployment {
            bucket: bucket.clone(),
            source_dir: config.model_source_dir.clone(),
        },
        &[&bucket],
    )?;

    stack.add(
        "ModelsBucketReadGrant",
        ResourceSpec::BucketReadGrant {
            bucket: bucket.clone(),
            grantee: function.clone(),
        },
        &[&bucket, &function],
    )?;

    let url = stack.add(
        "PredictionUrl",
        ResourceSpec::FunctionUrl {
            function: function.clone(),
            auth: config.url_auth,
            cors: CorsPolicy {
                allowed_origins: config.allowed_origins.clone(),
            },
        },
        &[&function],
    )?;

    stack.add(
        "PredictionUrlPermission",
        ResourceSpec::UrlInvokePermission {
            function: function.clone(),
            principal: "*".to_owned(),
            action: "lambda:InvokeFunctionUrl".to_owned(),
        },
        &[&function, &url],
    )?;

    stack.output("FunctionUrl", &format!("{url}.FunctionUrl"));

    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc(name: &str) -> ResourceSpec {
        ResourceSpec::Vpc {
            name: name.to_owned(),
        }
    }

    fn position(template: &Template, id: &str) -> usize {
        template
            .resources
            .iter()
            .position(|r| r.logical_id == id)
            .unwrap_or_else(|| panic!("resource {id} missing from template"))
    }

    #[test]
    fn prediction_stack_orders_the_dependency_chain() {
        let template = prediction_stack(&StackConfig::default())
            .unwrap()
            .synth()
            .unwrap();

        assert_eq!(template.resources.len(), 9);
        assert!(position(&template, "Vpc") < position(&template, "ModelFs"));
        assert!(position(&template, "ModelFs") < position(&template, "ModelFsAccessPoint"));
        assert!(position(&template, "Vpc") < position(&template, "PredictionFunction"));
        assert!(
            position(&template, "ModelFsAccessPoint") < position(&template, "PredictionFunction")
        );
        assert!(
            position(&template, "PredictionFunction") < position(&template, "ModelsBucketReadGrant")
        );
        assert!(position(&template, "ModelsBucket") < position(&template, "ModelsBucketReadGrant"));
        assert!(position(&template, "PredictionFunction") < position(&template, "PredictionUrl"));
        assert!(
            position(&template, "PredictionUrl") < position(&template, "PredictionUrlPermission")
        );
    }

    #[test]
    fn synthesis_is_deterministic() {
        let config = StackConfig::default();
        let first = serde_json::to_string(&prediction_stack(&config).unwrap().synth().unwrap());
        let second = serde_json::to_string(&prediction_stack(&config).unwrap().synth().unwrap());
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn declaration_order_breaks_ties_between_independent_resources() {
        let mut stack = Stack::new("Test");
        stack.add("B", vpc("b"), &[]).unwrap();
        stack.add("A", vpc("a"), &[]).unwrap();

        let template = stack.synth().unwrap();
        assert_eq!(template.resources[0].logical_id, "B");
        assert_eq!(template.resources[1].logical_id, "A");
    }

    #[test]
    fn forward_references_are_allowed() {
        let mut stack = Stack::new("Test");
        stack.add("Late", vpc("late"), &["Early"]).unwrap();
        stack.add("Early", vpc("early"), &[]).unwrap();

        let template = stack.synth().unwrap();
        assert_eq!(template.resources[0].logical_id, "Early");
        assert_eq!(template.resources[1].logical_id, "Late");
    }

    #[test]
    fn duplicate_logical_ids_are_rejected() {
        let mut stack = Stack::new("Test");
        stack.add("A", vpc("a"), &[]).unwrap();
        let err = stack.add("A", vpc("again"), &[]).unwrap_err();
        assert_eq!(err, SynthError::DuplicateId("A".to_owned()));
    }

    #[test]
    fn unknown_dependencies_are_rejected() {
        let mut stack = Stack::new("Test");
        stack.add("A", vpc("a"), &["Missing"]).unwrap();
        let err = stack.synth().unwrap_err();
        assert_eq!(
            err,
            SynthError::UnknownDependency {
                id: "A".to_owned(),
                dependency: "Missing".to_owned(),
            }
        );
    }

    #[test]
    fn dependency_cycles_are_rejected() {
        let mut stack = Stack::new("Test");
        stack.add("A", vpc("a"), &["B"]).unwrap();
        stack.add("B", vpc("b"), &["A"]).unwrap();
        assert!(matches!(stack.synth(), Err(SynthError::DependencyCycle(_))));
    }

    #[test]
    fn template_spells_out_the_public_posture() {
        let template = prediction_stack(&StackConfig::default())
            .unwrap()
            .synth()
            .unwrap();
        let json = serde_json::to_value(&template).unwrap();

        let resources = json["resources"].as_array().unwrap();
        let url = resources
            .iter()
            .find(|r| r["logical_id"] == "PredictionUrl")
            .unwrap();
        assert_eq!(url["auth"], "NONE");
        assert_eq!(url["cors"]["allowed_origins"][0], "*");

        let permission = resources
            .iter()
            .find(|r| r["logical_id"] == "PredictionUrlPermission")
            .unwrap();
        assert_eq!(permission["principal"], "*");
        assert_eq!(permission["action"], "lambda:InvokeFunctionUrl");
    }

    #[test]
    fn function_sizing_and_mount_come_from_config() {
        let config = StackConfig {
            memory_mb: 1024,
            timeout_secs: 15,
            ..StackConfig::default()
        };
        let template = prediction_stack(&config).unwrap().synth().unwrap();
        let json = serde_json::to_value(&template).unwrap();

        let function = json["resources"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["logical_id"] == "PredictionFunction")
            .unwrap()
            .clone();
        assert_eq!(function["memory_mb"], 1024);
        assert_eq!(function["timeout_secs"], 15);
        assert_eq!(function["mount"]["mount_path"], "/mnt/models");
        assert_eq!(function["mount"]["access_point"], "ModelFsAccessPoint");
    }

    #[test]
    fn function_url_is_exported_as_an_output() {
        let template = prediction_stack(&StackConfig::default())
            .unwrap()
            .synth()
            .unwrap();
        assert_eq!(template.outputs.len(), 1);
        assert_eq!(template.outputs[0].name, "FunctionUrl");
        assert_eq!(template.outputs[0].value, "PredictionUrl.FunctionUrl");
    }
}
