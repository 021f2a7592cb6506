// Lesson 2: arithmetic on field data and conditional decisions

use futures_util::future::BoxFuture;

use super::ExerciseSpec;
use crate::args;
use crate::context::BoundContext;
use crate::error::CaseResult;
use crate::expect::{expect_close, expect_eq};

/// Fertilizer prices in zł/kg: N, P2O5, K2O
const CENA_N: f64 = 4.5;
const CENA_P: f64 = 3.2;
const CENA_K: f64 = 3.0;

pub(super) fn exercises() -> Vec<ExerciseSpec> {
    vec![
        ExerciseSpec::new("koszt_nawozow", "Kalkulator kosztu nawożenia", 2)
            .function("koszt_nawozow")
            .case("test_typowe_dawki", koszt_typowe_dawki)
            .case("test_sam_azot", koszt_sam_azot)
            .case("test_bez_nawozenia", koszt_bez_nawozenia),
        ExerciseSpec::new("nawadnianie", "Decyzja o nawadnianiu", 2)
            .function("decyzja_nawadniania")
            .case("test_pilne", nawadnianie_pilne)
            .case("test_zalecane", nawadnianie_zalecane)
            .case("test_norma", nawadnianie_norma)
            .case("test_granice", nawadnianie_granice),
    ]
}

fn koszt(powierzchnia: f64, n: f64, p: f64, k: f64) -> f64 {
    powierzchnia * (n * CENA_N + p * CENA_P + k * CENA_K)
}

fn koszt_typowe_dawki(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let wynik = ctx.call("koszt_nawozow", args![5.0, 150, 80, 120]).await?;
        expect_close(&wynik, koszt(5.0, 150.0, 80.0, 120.0), 0.01)
    })
}

fn koszt_sam_azot(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let wynik = ctx.call("koszt_nawozow", args![2.0, 100, 0, 0]).await?;
        expect_close(&wynik, koszt(2.0, 100.0, 0.0, 0.0), 0.01)
    })
}

fn koszt_bez_nawozenia(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let wynik = ctx.call("koszt_nawozow", args![12.5, 0, 0, 0]).await?;
        expect_close(&wynik, 0.0, 0.01)
    })
}

fn nawadnianie_pilne(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let chlodno = ctx.call("decyzja_nawadniania", args![25, 18]).await?;
        expect_eq(&chlodno, "pilne")?;
        // very dry soil wins over the heat rule
        let goraco = ctx.call("decyzja_nawadniania", args![20, 32]).await?;
        expect_eq(&goraco, "pilne")
    })
}

fn nawadnianie_zalecane(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let decyzja = ctx.call("decyzja_nawadniania", args![35, 28]).await?;
        expect_eq(&decyzja, "zalecane")
    })
}

fn nawadnianie_norma(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let chlodno = ctx.call("decyzja_nawadniania", args![35, 20]).await?;
        expect_eq(&chlodno, "norma")?;
        let wilgotno = ctx.call("decyzja_nawadniania", args![55, 30]).await?;
        expect_eq(&wilgotno, "norma")
    })
}

fn nawadnianie_granice(ctx: &mut BoundContext) -> BoxFuture<'_, CaseResult> {
    Box::pin(async move {
        let przy_30 = ctx.call("decyzja_nawadniania", args![30, 30]).await?;
        expect_eq(&przy_30, "zalecane")?;
        let przy_40 = ctx.call("decyzja_nawadniania", args![40, 30]).await?;
        expect_eq(&przy_40, "norma")?;
        let przy_25_stopniach = ctx.call("decyzja_nawadniania", args![35, 25]).await?;
        expect_eq(&przy_25_stopniach, "norma")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_cost() {
        assert!((koszt(5.0, 150.0, 80.0, 120.0) - 6455.0).abs() < 1e-9);
        assert!((koszt(2.0, 100.0, 0.0, 0.0) - 900.0).abs() < 1e-9);
    }
}
