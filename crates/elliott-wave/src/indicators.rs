use analysis_core::{Num, PriceSeries};

/// True range of the bar at `index`. The first bar of a series has no
/// previous close, so its range is simply high minus low.
pub fn true_range<S: PriceSeries + ?Sized>(series: &S, index: usize) -> S::Num {
    let high = series.high(index);
    let low = series.low(index);
    let high_low = high - low;
    if index <= series.begin_index() {
        return high_low;
    }
    let prev_close = series.close(index - 1);
    let high_close = (high - prev_close).abs();
    let low_close = (low - prev_close).abs();
    high_low.maximum(high_close).maximum(low_close)
}

/// Average True Range aligned to bar indices.
///
/// Element `k` holds the ATR at bar `begin_index + k`, for every bar up to and
/// including `end`. Until `period` ranges are available the value is the plain
/// average of the ranges seen so far; after that Wilder smoothing applies.
pub fn atr<S: PriceSeries + ?Sized>(series: &S, period: usize, end: usize) -> Vec<S::Num> {
    let begin = series.begin_index();
    if period == 0 || series.is_empty() || end < begin {
        return vec![];
    }
    let end = series.end_index().map_or(end, |last| end.min(last));

    let period_num = S::Num::from_usize(period);
    let mut values = Vec::with_capacity(end - begin + 1);
    let mut sum = S::Num::zero();
    let mut atr = S::Num::nan();
    let mut seen = 0usize;

    for i in begin..=end {
        let tr = true_range(series, i);
        if !tr.is_valid() {
            // carry the last value over bars with missing prices
            values.push(atr);
            continue;
        }
        seen += 1;
        if seen <= period {
            sum = sum + tr;
            atr = sum / S::Num::from_usize(seen);
        } else {
            atr = (atr * (period_num - S::Num::one()) + tr) / period_num;
        }
        values.push(atr);
    }

    values
}
