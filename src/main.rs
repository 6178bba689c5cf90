fn main() -> anyhow::Result<()> {
    windmill_viewer::viewer::run()
}
