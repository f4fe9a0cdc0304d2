//! Build declarations of the host game project: targets and module rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    Game,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildSettingsVersion {
    V6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncludeOrderVersion {
    Unreal5_7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PchUsage {
    UseExplicitOrSharedPCHs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    pub name: String,
    pub target_type: TargetType,
    pub build_settings: BuildSettingsVersion,
    pub include_order: IncludeOrderVersion,
    pub extra_modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRules {
    pub name: String,
    pub pch_usage: PchUsage,
    pub public_dependencies: Vec<String>,
    #[serde(default)]
    pub private_dependencies: Vec<String>,
    pub public_include_paths: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("target {0} is declared more than once")]
    DuplicateTarget(String),
    #[error("target {target} names module {module}, which has no rules")]
    MissingModule { target: String, module: String },
    #[error("module {module} lists dependency {dependency} more than once")]
    DuplicateDependency { module: String, dependency: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub targets: Vec<BuildTarget>,
    pub modules: Vec<ModuleRules>,
}

const PROJECT_MODULE: &str = "Gamejam2026";

const PUBLIC_DEPENDENCIES: [&str; 10] = [
    "Core",
    "CoreUObject",
    "Engine",
    "InputCore",
    "EnhancedInput",
    "AIModule",
    "StateTreeModule",
    "GameplayStateTreeModule",
    "UMG",
    "Slate",
];

const VARIANT_DIRECTORIES: [&str; 13] = [
    "Variant_Platforming",
    "Variant_Platforming/Animation",
    "Variant_Combat",
    "Variant_Combat/AI",
    "Variant_Combat/Animation",
    "Variant_Combat/Gameplay",
    "Variant_Combat/Interfaces",
    "Variant_Combat/UI",
    "Variant_SideScrolling",
    "Variant_SideScrolling/AI",
    "Variant_SideScrolling/Gameplay",
    "Variant_SideScrolling/Interfaces",
    "Variant_SideScrolling/UI",
];

fn target(name: &str, target_type: TargetType) -> BuildTarget {
    BuildTarget {
        name: name.to_string(),
        target_type,
        build_settings: BuildSettingsVersion::V6,
        include_order: IncludeOrderVersion::Unreal5_7,
        extra_modules: vec![PROJECT_MODULE.to_string()],
    }
}

impl ProjectManifest {
    /// Declarations of the Gamejam2026 game and editor targets.
    pub fn gamejam2026() -> Self {
        let mut include_paths = vec![PROJECT_MODULE.to_string()];
        include_paths.extend(
            VARIANT_DIRECTORIES
                .iter()
                .map(|dir| format!("{}/{}", PROJECT_MODULE, dir)),
        );

        Self {
            targets: vec![
                target("Gamejam2026", TargetType::Game),
                target("Gamejam2026Editor", TargetType::Editor),
            ],
            modules: vec![ModuleRules {
                name: PROJECT_MODULE.to_string(),
                pch_usage: PchUsage::UseExplicitOrSharedPCHs,
                public_dependencies: PUBLIC_DEPENDENCIES.iter().map(|m| m.to_string()).collect(),
                private_dependencies: Vec::new(),
                public_include_paths: include_paths,
            }],
        }
    }

    pub fn target(&self, name: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|target| target.name == name)
    }

    pub fn module(&self, name: &str) -> Option<&ModuleRules> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut names = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name.as_str()) {
                return Err(ManifestError::DuplicateTarget(target.name.clone()));
            }
            for module in &target.extra_modules {
                if self.module(module).is_none() {
                    return Err(ManifestError::MissingModule {
                        target: target.name.clone(),
                        module: module.clone(),
                    });
                }
            }
        }

        for module in &self.modules {
            let mut seen = HashSet::new();
            let all = module
                .public_dependencies
                .iter()
                .chain(module.private_dependencies.iter());
            for dependency in all {
                if !seen.insert(dependency.as_str()) {
                    return Err(ManifestError::DuplicateDependency {
                        module: module.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
