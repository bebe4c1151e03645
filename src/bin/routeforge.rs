fn main() -> anyhow::Result<()> {
    routeforge::cli::run_cli()
}
