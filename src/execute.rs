use std::fs;
use std::io::{self, Write};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use colored::Colorize;
use toolchest::activate::{active_version, remove_link, update_link, verify_link};
use toolchest::config::Config;
use toolchest::error::UserError;
use toolchest::extract::extract;
use toolchest::fetch::fetch;
use toolchest::paths;
use toolchest::registry::{InstallStatus, Registry, ToolVersion};
use toolchest::sources::SourceRegistry;
use toolchest::util::{
    arch_tag, current_platform, digest_for_file, format_bytes, locate_binary, normalize_version,
    split_spec, validate_tool_name,
};
use toolchest::verify::verify;
use crate::cli::{CLI, ToolchestCommand};

pub fn execute(cli: CLI) -> Result<()> {
    let sources = SourceRegistry::builtin();
    match cli.command {
        ToolchestCommand::Init => execute_init(),
        ToolchestCommand::Install { spec } => execute_install(&sources, &spec),
        ToolchestCommand::Uninstall { spec, force } => execute_uninstall(&spec, force),
        ToolchestCommand::Use { spec } => execute_use(&spec),
        ToolchestCommand::List { tool, remote } => execute_list(&sources, tool.as_deref(), remote),
        ToolchestCommand::Info { tool } => execute_info(&tool),
    }
}

pub fn execute_init() -> Result<()> {
    let home = paths::toolchest_home()?;
    let bin_dir = paths::bin_dir()?;
    let tools_dir = paths::tools_dir()?;
    let cache_dir = paths::cache_dir()?;
    for dir in [&home, &tools_dir, &cache_dir, &bin_dir] {
        fs::create_dir_all(dir).map_err(|e| {
            UserError::new(
                format!("failed to create directory {}", dir.display()),
                e.to_string(),
                "Check write permissions for your home directory",
            )
        })?;
    }

    let config_path = paths::config_path()?;
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        Config::default().save(&config_path)?;
        println!("Created {}", config_path.display());
    }

    let registry_path = paths::registry_path()?;
    if registry_path.exists() {
        println!("Registry already exists at {}", registry_path.display());
    } else {
        Registry::new().save(&registry_path)?;
        println!("Created {}", registry_path.display());
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    let on_path = std::env::split_paths(&path_var).any(|p| p == bin_dir);
    if !on_path {
        println!("\n{} {} is not on your PATH", "warning:".yellow(), bin_dir.display());
        println!("Add it to your shell configuration, e.g.:");
        println!("    export PATH=\"{}:$PATH\"", bin_dir.display());
    }

    println!("\nToolchest initialized at {}", home.display());
    Ok(())
}

pub fn execute_install(sources: &SourceRegistry, spec: &str) -> Result<()> {
    let (tool_name, version) = split_spec(spec)?;
    validate_tool_name(&tool_name)?;

    let source = sources.get(&tool_name).map_err(|e| {
        UserError::new(
            format!("tool '{tool_name}' is not supported"),
            e.to_string(),
            format!("Supported tools: {}", sources.list().join(", ")),
        )
    })?;

    let version = if version == "latest" {
        println!("Resolving the latest {tool_name} version");
        let versions = source.list_versions()?;
        match versions.into_iter().next() {
            Some(latest) => latest,
            None => bail!("no published versions found for {tool_name}"),
        }
    } else {
        version
    };
    let version = normalize_version(&version)?;

    let (os, arch) = current_platform();
    if !source.supported_archs().contains(&arch) {
        return Err(UserError::new(
            format!("{tool_name} does not support this machine"),
            format!("no artifacts are published for {os}/{arch}"),
            format!("Supported architectures: {}", source.supported_archs().join(", ")),
        )
        .into());
    }

    let registry_path = paths::registry_path()?;
    let mut registry = Registry::load(&registry_path)?;
    if registry.is_installed(&tool_name, &version) {
        println!("{tool_name}@{version} is already installed");
        return Ok(());
    }

    let download_url = source.download_url(&version, os, arch);
    let archive_name = download_url
        .rsplit('/')
        .next()
        .unwrap_or("download")
        .to_string();
    let cache_dir = paths::cache_dir()?;
    let archive_path = cache_dir.join(&archive_name);

    println!("Installing {tool_name}@{version} for {os}/{arch}");
    println!("Downloading {download_url}");
    fetch(&download_url, &archive_path)?;

    let checksum_url = source.checksum_url(&version, os, arch);
    let checksum_path = cache_dir.join(format!("{tool_name}-{version}.sha256sums"));
    fetch(&checksum_url, &checksum_path).context("failed to download the checksum list")?;
    let checksum_list = fs::read_to_string(&checksum_path)
        .with_context(|| format!("failed to read {}", checksum_path.display()))?;
    let expected = digest_for_file(&checksum_list, &archive_name)?;

    println!("Verifying download integrity");
    if let Err(e) = verify(&archive_path, &expected) {
        // keep nothing that failed verification
        let _ = fs::remove_file(&archive_path);
        return Err(e);
    }

    let version_dir = paths::tools_dir()?.join(&tool_name).join(&version);
    println!("Extracting {} artifact", source.archive_format());
    extract(&archive_path, &version_dir, source.archive_format(), source.binary_name())?;

    let binary_path = locate_binary(&version_dir, source.binary_name()).map_err(|e| {
        UserError::new(
            "binary not found after extraction",
            e.to_string(),
            "The artifact may not contain the expected binary; report this against the tool source",
        )
    })?;
    let size_bytes = fs::metadata(&binary_path)
        .with_context(|| format!("failed to stat {}", binary_path.display()))?
        .len();

    registry.add_version(
        &tool_name,
        &version,
        ToolVersion {
            tool_name: tool_name.clone(),
            version: version.clone(),
            binary_path: binary_path.clone(),
            installed_at: Some(Utc::now()),
            size_bytes,
            source_url: download_url,
            checksum: expected,
            architecture: arch_tag(),
            status: InstallStatus::Complete,
        },
    );
    registry
        .save(&registry_path)
        .context("the installation finished but was not recorded; run the install again")?;

    println!("{} installed {tool_name}@{version}", "ok:".green());
    println!("Binary: {}", binary_path.display());
    println!("\nActivate it with:\n    toolchest use {tool_name}@{version}");
    Ok(())
}

pub fn execute_use(spec: &str) -> Result<()> {
    let (tool_name, version) = split_spec(spec)?;
    validate_tool_name(&tool_name)?;
    let version = normalize_version(&version)?;

    let registry = Registry::load(&paths::registry_path()?)?;
    let Some(record) = registry.get_version(&tool_name, &version) else {
        return Err(UserError::new(
            format!("{tool_name}@{version} is not installed"),
            "the version is not in the registry",
            format!("Run 'toolchest install {tool_name}@{version}' first"),
        )
        .into());
    };

    let link = paths::bin_dir()?.join(&tool_name);
    update_link(&record.binary_path, &link)?;
    println!("{} activated {tool_name}@{version}", "ok:".green());
    println!("{} -> {}", link.display(), record.binary_path.display());

    // best effort: remember the choice as the tool's default
    let config_path = paths::config_path()?;
    match Config::load(&config_path) {
        Ok(mut config) => {
            config.set_default(&tool_name, &version);
            if let Err(e) = config.save(&config_path) {
                println!("{} could not update {}: {e:#}", "warning:".yellow(), config_path.display());
            }
        }
        Err(e) => {
            println!("{} could not read {}: {e:#}", "warning:".yellow(), config_path.display());
        }
    }
    Ok(())
}

pub fn execute_uninstall(spec: &str, force: bool) -> Result<()> {
    let (tool_name, version) = split_spec(spec)?;
    validate_tool_name(&tool_name)?;
    let version = normalize_version(&version)?;

    let registry_path = paths::registry_path()?;
    let mut registry = Registry::load(&registry_path)?;
    let Some(record) = registry.get_version(&tool_name, &version).cloned() else {
        return Err(UserError::new(
            format!("{tool_name}@{version} is not installed"),
            "the version is not in the registry",
            format!("Run 'toolchest list {tool_name}' to see installed versions"),
        )
        .into());
    };

    let link = paths::bin_dir()?.join(&tool_name);
    let is_active = active_version(&link, &tool_name).as_deref() == Some(version.as_str());
    if is_active {
        println!(
            "{} {tool_name}@{version} is currently active; uninstalling removes its link\n",
            "warning:".yellow()
        );
    }

    if !force {
        println!("About to uninstall {tool_name}@{version} ({})", record.binary_path.display());
        print!("Continue? [y/N]: ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin()
            .read_line(&mut answer)
            .context("failed to read the confirmation; use --force to skip it")?;
        let answer = answer.trim().to_ascii_lowercase();
        if answer != "y" && answer != "yes" {
            println!("Uninstall cancelled");
            return Ok(());
        }
    }

    let version_dir = paths::tools_dir()?.join(&tool_name).join(&version);
    fs::remove_dir_all(&version_dir).map_err(|e| {
        UserError::new(
            format!("failed to remove {}", version_dir.display()),
            e.to_string(),
            "Check write permissions for the toolchest home",
        )
    })?;

    registry.remove_version(&tool_name, &version);
    registry
        .save(&registry_path)
        .context("the files were removed but the registry was not updated")?;

    // prune the tool dir once its last version is gone
    let tool_dir = paths::tools_dir()?.join(&tool_name);
    if let Ok(mut entries) = fs::read_dir(&tool_dir) {
        if entries.next().is_none() {
            let _ = fs::remove_dir(&tool_dir);
        }
    }

    if is_active {
        if let Err(e) = remove_link(&link) {
            println!("{} could not remove {}: {e:#}", "warning:".yellow(), link.display());
        } else {
            println!("Removed link {}", link.display());
        }
    }

    println!("{} uninstalled {tool_name}@{version}", "ok:".green());
    if is_active {
        let remaining = registry.list_versions(&tool_name);
        if remaining.is_empty() {
            println!("No other versions of {tool_name} are installed");
        } else {
            println!("Activate another version with 'toolchest use {tool_name}@<version>':");
            for v in remaining {
                println!("    {v}");
            }
        }
    }
    Ok(())
}

pub fn execute_list(sources: &SourceRegistry, tool: Option<&str>, remote: bool) -> Result<()> {
    if remote {
        let Some(tool) = tool else {
            bail!("--remote needs a tool name, e.g. 'toolchest list terraform --remote'");
        };
        for version in sources.get(tool)?.list_versions()? {
            println!("{version}");
        }
        return Ok(());
    }

    let registry = Registry::load(&paths::registry_path()?)?;
    let bin_dir = paths::bin_dir()?;
    let tools = match tool {
        Some(tool) => {
            if registry.list_versions(tool).is_empty() {
                println!("No versions of {tool} are installed");
                return Ok(());
            }
            vec![tool.to_string()]
        }
        None => registry.list_tools(),
    };
    if tools.is_empty() {
        println!("No tools installed");
        return Ok(());
    }

    for tool in tools {
        println!("{tool}");
        let active = active_version(&bin_dir.join(&tool), &tool);
        for version in registry.list_versions(&tool) {
            if active.as_deref() == Some(version.as_str()) {
                println!("  * {}", version.green());
            } else {
                println!("    {version}");
            }
        }
    }
    Ok(())
}

pub fn execute_info(tool: &str) -> Result<()> {
    validate_tool_name(tool)?;
    let registry = Registry::load(&paths::registry_path()?)?;
    if registry.list_versions(tool).is_empty() {
        return Err(UserError::new(
            format!("no versions of {tool} are installed"),
            "the tool is not in the registry",
            format!("Run 'toolchest install {tool}@<version>' first"),
        )
        .into());
    }

    let link = paths::bin_dir()?.join(tool);
    let Some(active) = active_version(&link, tool) else {
        return Err(UserError::new(
            format!("no active version of {tool}"),
            "the activation link is missing or broken",
            format!("Run 'toolchest use {tool}@<version>' to activate one"),
        )
        .into());
    };

    let Some(record) = registry.get_version(tool, &active) else {
        return Err(UserError::new(
            format!("active version {active} of {tool} is not in the registry"),
            "the activation link and the registry disagree",
            format!("Re-activate with 'toolchest use {tool}@<version>'"),
        )
        .into());
    };

    println!("Tool: {tool}");
    println!("Active version: {active}");
    println!("Binary: {}", record.binary_path.display());
    if let Some(at) = record.installed_at {
        println!("Installed: {}", at.format("%Y-%m-%d %H:%M:%S"));
    }
    if record.size_bytes > 0 {
        println!("Size: {}", format_bytes(record.size_bytes));
    }
    if !record.architecture.is_empty() {
        println!("Architecture: {}", record.architecture);
    }
    if !record.source_url.is_empty() {
        println!("Source: {}", record.source_url);
    }
    if !record.checksum.is_empty() {
        println!("Checksum: {}", record.checksum);
    }

    if let Err(e) = verify_link(&link, &record.binary_path) {
        println!("\n{} {e:#}", "warning:".yellow());
    }
    if !record.binary_path.exists() {
        println!(
            "\n{} binary missing at {}; reinstall {tool}@{active}",
            "warning:".yellow(),
            record.binary_path.display()
        );
    }
    Ok(())
}
