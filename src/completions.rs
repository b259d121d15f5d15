use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap_complete::{generate, Shell};
use tracing::info;

use crate::app::AppError;

const BIN_NAME: &str = "daybook";

pub fn generate_completions(shell: Shell, buf: &mut dyn Write) {
    let mut cmd = crate::cli::styled_command();
    generate(shell, &mut cmd, BIN_NAME, buf);
}

pub fn detect_current_shell() -> Option<Shell> {
    let shell_var = std::env::var("SHELL").ok()?;
    shell_from_path(&shell_var)
}

fn shell_from_path(shell_path: &str) -> Option<Shell> {
    parse_shell(shell_path.rsplit('/').next()?)
}

fn parse_shell(raw: &str) -> Option<Shell> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "powershell" | "pwsh" => Some(Shell::PowerShell),
        _ => None,
    }
}

fn install_path_for_home(shell: Shell, home: &Path) -> Option<PathBuf> {
    match shell {
        Shell::Bash => Some(home.join(".local/share/bash-completion/completions/daybook")),
        Shell::Zsh => Some(home.join(".config/daybook/completions/daybook.zsh")),
        Shell::Fish => Some(home.join(".config/fish/completions/daybook.fish")),
        _ => None,
    }
}

pub fn install_completions(shell: Shell) -> io::Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?;
    install_completions_into(shell, Path::new(&home))
}

fn install_completions_into(shell: Shell, home: &Path) -> io::Result<PathBuf> {
    let path = install_path_for_home(shell, home).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no install path for {shell:?}"),
        )
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut buf = Vec::new();
    generate_completions(shell, &mut buf);
    std::fs::write(&path, buf)?;

    if shell == Shell::Zsh {
        patch_zshrc(home, &path)?;
    }
    info!(shell = ?shell, path = %path.display(), "installed shell completions");
    Ok(path)
}

fn patch_zshrc(home: &Path, completions_path: &Path) -> io::Result<()> {
    let zshrc = home.join(".zshrc");
    let source_line = format!("source \"{}\"", completions_path.display());

    if zshrc.exists() {
        let content = std::fs::read_to_string(&zshrc)?;
        if content.contains(&source_line) {
            return Ok(());
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&zshrc)?;
    writeln!(file)?;
    writeln!(file, "# daybook shell completions")?;
    writeln!(file, "{source_line}")?;
    Ok(())
}

pub fn run_completions_command(shell_arg: Option<&str>, install: bool) -> Result<(), AppError> {
    let shell = match shell_arg {
        Some(name) => parse_shell(name)
            .ok_or_else(|| AppError::InvalidArgument(format!("unknown shell '{name}'")))?,
        None => detect_current_shell().ok_or_else(|| {
            AppError::InvalidArgument(
                "unable to detect shell from $SHELL; pass a shell name".to_string(),
            )
        })?,
    };

    if install {
        let path = install_completions(shell)?;
        println!("completions installed to {}", path.display());
    } else {
        let mut stdout = io::stdout().lock();
        generate_completions(shell, &mut stdout);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap_complete::Shell;

    use super::{
        generate_completions, install_completions_into, install_path_for_home, parse_shell,
        run_completions_command, shell_from_path,
    };

    #[test]
    fn shells_are_recognized_from_login_paths() {
        assert_eq!(shell_from_path("/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(shell_from_path("/usr/bin/bash"), Some(Shell::Bash));
        assert_eq!(shell_from_path("/usr/bin/pwsh"), Some(Shell::PowerShell));
        assert_eq!(shell_from_path("/usr/bin/csh"), None);
        assert_eq!(parse_shell("FISH"), Some(Shell::Fish));
    }

    #[test]
    fn generated_script_names_the_binary() {
        let mut buf = Vec::new();
        generate_completions(Shell::Bash, &mut buf);
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("daybook"));
        assert!(text.contains("rollover"));
    }

    #[test]
    fn install_writes_script_and_patches_zshrc_once() {
        let home = std::env::temp_dir().join(format!("daybook-comp-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&home).expect("home dir should be creatable");

        let bash = install_completions_into(Shell::Bash, &home).expect("bash install");
        assert!(bash.exists());

        install_completions_into(Shell::Zsh, &home).expect("zsh install");
        install_completions_into(Shell::Zsh, &home).expect("second zsh install");
        let rc = std::fs::read_to_string(home.join(".zshrc")).expect("read .zshrc");
        assert_eq!(rc.matches("source").count(), 1);
        assert!(rc.contains("daybook.zsh"));

        assert!(install_completions_into(Shell::Elvish, &home).is_err());
        let _ = std::fs::remove_dir_all(home);
    }

    #[test]
    fn unsupported_shells_have_no_install_path() {
        let home = PathBuf::from("/tmp/home");
        assert!(install_path_for_home(Shell::PowerShell, &home).is_none());
        assert!(run_completions_command(Some("nonsense"), false).is_err());
    }
}
