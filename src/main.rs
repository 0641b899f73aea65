use iron_cuff::args::TopLevelCmd;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let arg_config: TopLevelCmd = argh::from_env();
    iron_cuff::run(arg_config).await?;
    Ok(())
}
