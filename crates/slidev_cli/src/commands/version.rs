//! Version command - Print the tool, Slidev and image versions.

use anyhow::Result;
use clap::Args;

use slidev_runner::ToolVersion;

#[derive(Args)]
pub struct VersionArgs {
    /// Print only the version of this tool
    #[arg(long, conflicts_with_all = ["slidev", "docker"])]
    script: bool,

    /// Print only the bundled Slidev version
    #[arg(long, conflicts_with = "docker")]
    slidev: bool,

    /// Print only the container image reference
    #[arg(long)]
    docker: bool,
}

pub fn execute(args: VersionArgs) -> Result<()> {
    let version = ToolVersion::embedded()?;
    println!("{}", render(&args, &version));
    Ok(())
}

fn render(args: &VersionArgs, version: &ToolVersion) -> String {
    if args.script {
        version.script.clone()
    } else if args.slidev {
        version.slidev.clone()
    } else if args.docker {
        version.image_reference().to_string()
    } else {
        format!(
            "slidev-dkr {}\nslidev {}\nimage {}",
            version.script,
            version.slidev,
            version.image_reference()
        )
    }
}
