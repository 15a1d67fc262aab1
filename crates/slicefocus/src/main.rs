fn main() -> anyhow::Result<()> {
    slicefocus::init();

    slicefocus::cli::run()
}
