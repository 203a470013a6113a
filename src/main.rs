fn main() -> anyhow::Result<()> {
    bozor::cli::run()
}
