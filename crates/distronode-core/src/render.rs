//! Containerfile rendering.
//!
//! Each stage is emitted as: stage header (`FROM`, root user, environment),
//! ARG redeclarations, the user's prepend lines, the canonical body, then the
//! user's append lines. v1/v2 definitions render the legacy three-stage
//! layout; v3 adds a shared `base` stage and drops the intermediate stages
//! when nothing needs building.

use crate::assemble::BuildContext;
use crate::constants::{
    BUILD_SUBFOLDER, COLLECTIONS_PATH, DISTRONODE_SHARE_DIR, EE_LABEL, IMAGE_BUILD_DIR,
    INTROSPECT_BINDEP_OUT, INTROSPECT_PIP_OUT, KEYRING_FILE, LEGACY_CONFIG_FILE, OUTPUT_DIR,
    OUTPUT_SCRIPTS_DIR, ROLES_PATH, SCRIPTS_SUBFOLDER,
};
use crate::containerfile::{Containerfile, Directive};
use crate::requirements::{ManifestKind, SignatureVerification};
use crate::scripts::ENTRYPOINT;
use distronode_schema::{Definition, Stage, FINAL_IMAGE_BIN_PATH};

const ARG_BASE_IMAGE: &str = "EE_BASE_IMAGE";
const ARG_BUILDER_IMAGE: &str = "EE_BUILDER_IMAGE";
const ARG_PYCMD: &str = "PYCMD";
const ARG_PYPKG: &str = "PYPKG";
const ARG_PRESERVE_CACHE: &str = "PKGMGR_PRESERVE_CACHE";
const ARG_COLLECTION_OPTS: &str = "DISTRONODE_GALAXY_CLI_COLLECTION_OPTS";
const ARG_ROLE_OPTS: &str = "DISTRONODE_GALAXY_CLI_ROLE_OPTS";
const ARG_INSTALL_REFS: &str = "DISTRONODE_INSTALL_REFS";
const ARG_PKGMGR: &str = "PKGMGR";

/// Where one stage starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: Stage,
    pub from: String,
}

pub struct Renderer<'a> {
    definition: &'a Definition,
    context: &'a BuildContext,
    verification: &'a SignatureVerification,
}

impl<'a> Renderer<'a> {
    pub fn new(
        definition: &'a Definition,
        context: &'a BuildContext,
        verification: &'a SignatureVerification,
    ) -> Self {
        Self {
            definition,
            context,
            verification,
        }
    }

    fn legacy(&self) -> bool {
        self.definition.version.is_legacy()
    }

    /// Stages in emission order with the image each one starts from.
    pub fn plan(&self) -> Vec<StagePlan> {
        let base_image = format!("${ARG_BASE_IMAGE}");
        let builder_image = format!("${ARG_BUILDER_IMAGE}");
        let starts_from = |stage: Stage, from: &str| StagePlan {
            stage,
            from: from.to_owned(),
        };

        if self.legacy() {
            return vec![
                starts_from(Stage::Galaxy, &base_image),
                starts_from(Stage::Builder, &builder_image),
                starts_from(Stage::Final, &base_image),
            ];
        }

        let base = Stage::Base.as_str();
        let mut stages = vec![starts_from(Stage::Base, &base_image)];
        if self.definition.dependencies.needs_build_stages() {
            stages.push(starts_from(Stage::Galaxy, base));
            let builder_from = if self.definition.images.builder.is_some() {
                builder_image.as_str()
            } else {
                base
            };
            stages.push(starts_from(Stage::Builder, builder_from));
        }
        stages.push(starts_from(Stage::Final, base));
        stages
    }

    pub fn render(&self) -> Containerfile {
        let args = self.global_args();
        let mut file = Containerfile::new();
        file.extend(
            args.iter()
                .map(|(name, value)| Directive::arg_default(name, value.as_str())),
        );

        let stage_args: Vec<&str> = args
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| *name != ARG_BASE_IMAGE && *name != ARG_BUILDER_IMAGE)
            .collect();

        for plan in self.plan() {
            file.push(Directive::Blank);
            file.push(Directive::Comment(format!(
                "{} build stage",
                title_case(plan.stage.as_str())
            )));
            file.push(Directive::stage(plan.from.clone(), plan.stage.as_str()));
            self.stage_header(&mut file, plan.stage);
            file.extend(stage_args.iter().map(|name| Directive::arg(name)));

            let steps = self.definition.steps(plan.stage);
            if let Some(steps) = steps {
                file.extend(steps.prepend.iter().cloned().map(Directive::Raw));
            }
            match plan.stage {
                Stage::Base => self.base_body(&mut file),
                Stage::Galaxy => self.galaxy_body(&mut file),
                Stage::Builder => self.builder_body(&mut file, &plan),
                Stage::Final => self.final_body(&mut file),
            }
            if let Some(steps) = steps {
                file.extend(steps.append.iter().cloned().map(Directive::Raw));
            }
            if plan.stage == Stage::Final {
                self.final_trailer(&mut file);
            }
        }
        file
    }

    fn global_args(&self) -> Vec<(&'static str, String)> {
        let def = self.definition;
        let deps = &def.dependencies;
        let mut args = vec![(ARG_BASE_IMAGE, def.images.base.name.to_string())];
        if let Some(builder) = &def.images.builder {
            args.push((ARG_BUILDER_IMAGE, builder.name.to_string()));
        }
        args.push((ARG_PYCMD, deps.python_path.clone()));
        if let Some(pkg) = &deps.python_package_system {
            args.push((ARG_PYPKG, pkg.clone()));
        }
        if !self.legacy() {
            args.push((ARG_PRESERVE_CACHE, def.build_args.pkgmgr_preserve_cache.clone()));
        }
        args.push((ARG_COLLECTION_OPTS, def.build_args.galaxy_collection_opts.clone()));
        args.push((ARG_ROLE_OPTS, def.build_args.galaxy_role_opts.clone()));
        if let Some(refs) = deps.install_refs() {
            args.push((ARG_INSTALL_REFS, refs));
        }
        if !self.legacy() {
            args.push((ARG_PKGMGR, def.options.package_manager_path.clone()));
        }
        args
    }

    fn stage_header(&self, file: &mut Containerfile, stage: Stage) {
        if self.legacy() {
            if stage != Stage::Builder {
                file.push(Directive::User("root".to_owned()));
            }
            return;
        }
        if stage == Stage::Base {
            file.push(Directive::User("root".to_owned()));
        }
        file.push(Directive::env("PIP_BREAK_SYSTEM_PACKAGES", "1"));
    }

    fn base_body(&self, file: &mut Containerfile) {
        let deps = &self.definition.dependencies;
        file.push(Directive::copy(scripts_src(), format!("{OUTPUT_SCRIPTS_DIR}/")));
        file.push(Directive::copy(
            format!("{BUILD_SUBFOLDER}/{SCRIPTS_SUBFOLDER}/{ENTRYPOINT}"),
            format!("{FINAL_IMAGE_BIN_PATH}/{ENTRYPOINT}"),
        ));
        if deps.python_package_system.is_some() {
            file.push(Directive::run(format!(
                "${ARG_PKGMGR} install ${ARG_PYPKG} -y ; if [ -z ${ARG_PRESERVE_CACHE} ]; then ${ARG_PKGMGR} clean all; fi"
            )));
        }
        file.push(Directive::run(format!("${ARG_PYCMD} -m ensurepip")));
        if deps.install_refs().is_some() {
            file.push(Directive::run(format!(
                "${ARG_PYCMD} -m pip install --no-cache-dir ${ARG_INSTALL_REFS}"
            )));
        }
    }

    fn galaxy_body(&self, file: &mut Containerfile) {
        if !self.definition.options.skip_distronode_check {
            file.push(Directive::run(format!("{OUTPUT_SCRIPTS_DIR}/check_galaxy")));
        }
        if self.context.distronode_config {
            file.push(Directive::Add {
                src: format!("{BUILD_SUBFOLDER}/{LEGACY_CONFIG_FILE}"),
                dest: format!("~/.{LEGACY_CONFIG_FILE}"),
            });
        }
        file.push(Directive::copy(BUILD_SUBFOLDER, IMAGE_BUILD_DIR));
        file.push(Directive::Workdir(IMAGE_BUILD_DIR.to_owned()));

        if self.context.has(ManifestKind::Galaxy) {
            let manifest = ManifestKind::Galaxy.file_name();
            file.push(Directive::run(format!(
                "distronode-galaxy role install ${ARG_ROLE_OPTS} -r {manifest} --roles-path \"{ROLES_PATH}\""
            )));
            file.push(Directive::run(self.collection_install(manifest)));
        }
    }

    fn collection_install(&self, manifest: &str) -> String {
        let mut cmd = String::new();
        if !self.context.keyring {
            cmd.push_str("DISTRONODE_GALAXY_DISABLE_GPG_VERIFY=1 ");
        }
        cmd.push_str(&format!(
            "distronode-galaxy collection install ${ARG_COLLECTION_OPTS} -r {manifest} --collections-path \"{COLLECTIONS_PATH}\""
        ));
        if self.context.keyring {
            for code in &self.verification.ignore_signature_status_codes {
                cmd.push_str(&format!(" --ignore-signature-status-code {code}"));
            }
            if let Some(count) = &self.verification.required_valid_signature_count {
                cmd.push_str(&format!(" --required-valid-signature-count {count}"));
            }
            cmd.push_str(&format!(" --keyring \"{KEYRING_FILE}\""));
        }
        cmd
    }

    fn builder_body(&self, file: &mut Containerfile, plan: &StagePlan) {
        file.push(Directive::Workdir(IMAGE_BUILD_DIR.to_owned()));
        if plan.from == Stage::Base.as_str() {
            file.push(Directive::run(format!(
                "${ARG_PYCMD} -m pip install --no-cache-dir bindep pyyaml packaging"
            )));
        } else {
            file.push(Directive::copy(scripts_src(), format!("{OUTPUT_SCRIPTS_DIR}/")));
            file.push(Directive::run(format!(
                "{OUTPUT_SCRIPTS_DIR}/pip_install ${ARG_PYCMD}"
            )));
        }

        if self.context.has(ManifestKind::Galaxy) {
            file.push(Directive::copy_from(
                Stage::Galaxy.as_str(),
                DISTRONODE_SHARE_DIR,
                DISTRONODE_SHARE_DIR,
            ));
        }

        let mut introspect = format!("${ARG_PYCMD} {OUTPUT_SCRIPTS_DIR}/introspect.py introspect");
        let inputs = [
            (ManifestKind::Python, "--user-pip"),
            (ManifestKind::System, "--user-bindep"),
            (ManifestKind::ExcludePython, "--exclude-pip-reqs"),
            (ManifestKind::ExcludeSystem, "--exclude-bindep-reqs"),
            (ManifestKind::ExcludeCollections, "--exclude-collection-reqs"),
        ];
        for (kind, flag) in inputs {
            if self.context.has(kind) {
                let name = kind.file_name();
                file.push(Directive::copy(format!("{BUILD_SUBFOLDER}/{name}"), name));
                introspect.push_str(&format!(" {flag}={name}"));
            }
        }
        introspect.push_str(&format!(
            " --write-bindep={INTROSPECT_BINDEP_OUT} --write-pip={INTROSPECT_PIP_OUT}"
        ));
        file.push(Directive::run(introspect));
        file.push(Directive::run(format!("{OUTPUT_SCRIPTS_DIR}/assemble")));
    }

    fn final_body(&self, file: &mut Containerfile) {
        let options = &self.definition.options;
        if !options.skip_distronode_check {
            file.push(Directive::run(format!(
                "{OUTPUT_SCRIPTS_DIR}/check_distronode ${ARG_PYCMD}"
            )));
        }

        if self.legacy() || self.definition.dependencies.needs_build_stages() {
            if self.context.has(ManifestKind::Galaxy) {
                file.push(Directive::copy_from(
                    Stage::Galaxy.as_str(),
                    DISTRONODE_SHARE_DIR,
                    DISTRONODE_SHARE_DIR,
                ));
            }
            file.push(Directive::copy_from(
                Stage::Builder.as_str(),
                format!("{OUTPUT_DIR}/"),
                format!("{OUTPUT_DIR}/"),
            ));
            file.push(Directive::run(format!(
                "{OUTPUT_SCRIPTS_DIR}/install-from-bindep && rm -rf {OUTPUT_DIR}/wheels"
            )));
        }

        if options.relax_passwd_permissions {
            file.push(Directive::run("chmod ug+rw /etc/passwd"));
        }
        if let Some(workdir) = &options.workdir {
            file.push(Directive::run(format!(
                "mkdir -p {workdir} && chgrp 0 {workdir} && chmod -R ug+rwx {workdir}"
            )));
            file.push(Directive::Workdir(workdir.clone()));
        }
        if let Some(package) = options
            .container_init
            .as_ref()
            .and_then(|init| init.package_pip.as_ref())
        {
            let package = package.as_str().replace('\'', r"'\''");
            file.push(Directive::run(format!(
                "${ARG_PYCMD} -m pip install --no-cache-dir '{package}'"
            )));
        }
    }

    fn final_trailer(&self, file: &mut Containerfile) {
        let options = &self.definition.options;
        file.push(Directive::run(format!("rm -rf {OUTPUT_DIR}")));
        file.push(Directive::Label(EE_LABEL.to_owned()));
        if let Some(user) = &options.user {
            file.push(Directive::User(user.clone()));
        }
        if let Some(init) = &options.container_init {
            if let Some(entrypoint) = &init.entrypoint {
                file.push(Directive::Entrypoint(entrypoint.clone()));
            }
            if let Some(cmd) = &init.cmd {
                file.push(Directive::Cmd(cmd.clone()));
            }
        }
    }
}

fn scripts_src() -> String {
    format!("{BUILD_SUBFOLDER}/{SCRIPTS_SUBFOLDER}/")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
